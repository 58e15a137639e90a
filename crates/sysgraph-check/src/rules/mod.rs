//! Analyzer rule sets. Each module scans the whole graph and reports into a
//! shared [`ErrorAnalyzer`](crate::ErrorAnalyzer).

pub(crate) mod aspect;
pub(crate) mod entities;
pub(crate) mod query;
