//! Company outcomes and the funnel graph.
//!
//! `ClassifiedEmail[]` → `CompanyFlowResolver::resolve()` → `CompanyFlow[]`
//! → `FlowGraphBuilder::build()` → `FlowGraph` for an external renderer.

pub mod graph;
pub mod resolver;

pub use graph::{ColorTag, FlowEdge, FlowGraph, FlowGraphBuilder, FlowNode, OutcomeBuckets, SourceCounts};
pub use resolver::{CompanyFlags, CompanyFlow, CompanyFlowResolver, FlowOutcome};
