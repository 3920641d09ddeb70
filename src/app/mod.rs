// Application layer: the concrete pipelines wired from adapters and core routines.

pub mod pipelines;
