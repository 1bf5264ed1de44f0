//! Funnel graph construction.
//!
//! Nodes are funnel stages, edges carry company/application counts between
//! them. Every non-sink node's outgoing values sum to its count. Sinks
//! (`Rejected`, `Withdrew`, `Ghosted`, `No Reply`, `Accepted`, `Declined`)
//! have no outgoing edges and count their inflow.
//!
//! Interview stages are chained `1..=max_stage` without gaps. A stage with
//! no company ending there still gets a node; its population is the
//! aggregate of the nearest following populated stage. That number is an
//! estimate, not a measurement, and the node is flagged `estimated`.

use std::collections::HashMap;

use serde::{Serialize, Serializer};
use tracing::debug;

use crate::funnel::resolver::{CompanyFlow, FlowOutcome};
use crate::pipeline::types::MAX_INTERVIEW_STAGE;

const APPLIED: &str = "Applied";
const RECRUITER: &str = "Recruiter";
const TOTAL: &str = "Total Applications";
const OFFER: &str = "Offer";
const ACCEPTED: &str = "Accepted";
const DECLINED: &str = "Declined";
const REJECTED: &str = "Rejected";
const WITHDREW: &str = "Withdrew";
const GHOSTED: &str = "Ghosted";
const NO_REPLY: &str = "No Reply";

/// Slots per stage-keyed bucket: index 0 holds direct outcomes.
const STAGE_SLOTS: usize = MAX_INTERVIEW_STAGE as usize + 1;

/// Edge colour, keyed by destination category. Metadata for the renderer only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorTag {
    Applied,
    Interview,
    Rejected,
    Offer,
    Accepted,
    Declined,
    Withdrew,
    Ghosted,
}

impl ColorTag {
    pub fn rgba(&self) -> &'static str {
        match self {
            Self::Applied => "rgba(173, 216, 230, 0.8)",
            Self::Interview => "rgba(255, 165, 0, 0.6)",
            Self::Rejected => "rgba(255, 165, 0, 0.8)",
            Self::Offer | Self::Accepted => "rgba(144, 238, 144, 0.8)",
            Self::Declined => "rgba(144, 238, 144, 0.6)",
            Self::Withdrew => "rgba(255, 200, 120, 0.6)",
            Self::Ghosted => "rgba(173, 216, 230, 0.6)",
        }
    }
}

impl Serialize for ColorTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.rgba())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowNode {
    /// Display label with the count embedded, e.g. `"Rejected (12)"`.
    pub label: String,
    pub count: u64,
    /// Population inferred from a later stage rather than observed.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub estimated: bool,
    /// Label without the count.
    #[serde(skip)]
    pub name: String,
    #[serde(skip)]
    pub sink: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowEdge {
    pub source: usize,
    pub target: usize,
    pub value: u64,
    #[serde(rename = "colorTag")]
    pub color_tag: ColorTag,
}

/// Directed weighted funnel graph handed to the renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl FlowGraph {
    /// Look a node up by its label without the count.
    pub fn find(&self, name: &str) -> Option<(usize, &FlowNode)> {
        self.nodes.iter().enumerate().find(|(_, n)| n.name == name)
    }

    pub fn outgoing_total(&self, node: usize) -> u64 {
        self.edges
            .iter()
            .filter(|e| e.source == node)
            .map(|e| e.value)
            .sum()
    }

    pub fn incoming_total(&self, node: usize) -> u64 {
        self.edges
            .iter()
            .filter(|e| e.target == node)
            .map(|e| e.value)
            .sum()
    }

    /// Whether every non-sink node's outflow equals its count and sinks have no outflow.
    pub fn is_conserved(&self) -> bool {
        self.nodes.iter().enumerate().all(|(idx, node)| {
            let out = self.outgoing_total(idx);
            if node.sink { out == 0 } else { out == node.count }
        })
    }
}

/// Application counts feeding the `Total Applications` node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceCounts {
    pub applied: u64,
    pub confirmation: u64,
    /// Emails with any status other than `not_job_related`.
    pub job_related: u64,
    pub total_emails: u64,
}

impl SourceCounts {
    /// `applied + confirmation`, else job-related emails, else all emails.
    pub fn total_applications(&self) -> u64 {
        let explicit = self.applied + self.confirmation;
        if explicit > 0 {
            explicit
        } else if self.job_related > 0 {
            self.job_related
        } else {
            self.total_emails
        }
    }
}

/// Company counts per funnel outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeBuckets {
    pub accepted: u64,
    pub offer: u64,
    pub declined_offer: u64,
    /// Companies whose offer came after reaching each stage (0 = no interview).
    pub offer_by_stage: [u64; STAGE_SLOTS],
    pub rejected: [u64; STAGE_SLOTS],
    pub withdrew: [u64; STAGE_SLOTS],
    pub ghosted: [u64; STAGE_SLOTS],
}

impl OutcomeBuckets {
    pub fn from_flows(flows: &[CompanyFlow]) -> Self {
        let mut buckets = Self::default();
        let slot = |stage: u8| usize::from(stage.min(MAX_INTERVIEW_STAGE));
        for flow in flows {
            let offer_count = match flow.outcome() {
                FlowOutcome::Rejected { stage } => {
                    buckets.rejected[slot(stage)] += 1;
                    continue;
                }
                FlowOutcome::Withdrew { stage } => {
                    buckets.withdrew[slot(stage)] += 1;
                    continue;
                }
                FlowOutcome::Ghosted { stage } => {
                    buckets.ghosted[slot(stage)] += 1;
                    continue;
                }
                FlowOutcome::Accepted => &mut buckets.accepted,
                FlowOutcome::Offer => &mut buckets.offer,
                FlowOutcome::DeclinedOffer => &mut buckets.declined_offer,
            };
            *offer_count += 1;
            // Offer outcomes carry no stage; they leave from the stage reached.
            buckets.offer_by_stage[slot(flow.highest_interview_stage)] += 1;
        }
        buckets
    }

    pub fn total_rejected(&self) -> u64 {
        self.rejected.iter().sum()
    }

    pub fn total_withdrew(&self) -> u64 {
        self.withdrew.iter().sum()
    }

    pub fn total_ghosted(&self) -> u64 {
        self.ghosted.iter().sum()
    }

    pub fn total_offers(&self) -> u64 {
        self.accepted + self.offer + self.declined_offer
    }

    /// Number of companies bucketed.
    pub fn companies(&self) -> u64 {
        self.total_offers() + self.total_rejected() + self.total_withdrew() + self.total_ghosted()
    }

    /// Companies whose journey ended exactly at `stage`.
    pub fn ending_at(&self, stage: usize) -> u64 {
        self.rejected[stage] + self.withdrew[stage] + self.ghosted[stage] + self.offer_by_stage[stage]
    }

    /// Companies that reached `stage` or beyond.
    pub fn reaching(&self, stage: usize) -> u64 {
        (stage..STAGE_SLOTS).map(|s| self.ending_at(s)).sum()
    }

    /// Highest stage with any company ending there.
    pub fn max_stage(&self) -> usize {
        (1..STAGE_SLOTS)
            .rev()
            .find(|&s| self.ending_at(s) > 0)
            .unwrap_or(0)
    }
}

/// Mutable state of one graph build. Node indices are assigned in first-seen order.
#[derive(Debug, Default)]
struct GraphBuilder {
    labels: HashMap<String, usize>,
    nodes: Vec<FlowNode>,
    edges: Vec<FlowEdge>,
}

impl GraphBuilder {
    /// Index for `name`, creating the node on first request.
    fn node(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.labels.get(name) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(FlowNode {
            label: String::new(),
            count: 0,
            estimated: false,
            name: name.to_string(),
            sink: false,
        });
        self.labels.insert(name.to_string(), idx);
        idx
    }

    fn stage(&mut self, name: &str, count: u64) -> usize {
        let idx = self.node(name);
        self.nodes[idx].count = count;
        idx
    }

    fn link(&mut self, source: usize, target: usize, value: u64, color_tag: ColorTag) {
        if value == 0 {
            return;
        }
        if let Some(edge) = self
            .edges
            .iter_mut()
            .find(|e| e.source == source && e.target == target)
        {
            edge.value += value;
            return;
        }
        self.edges.push(FlowEdge {
            source,
            target,
            value,
            color_tag,
        });
    }

    /// Route `value` into a shared sink, creating it only when non-zero.
    fn sink(&mut self, source: usize, name: &str, value: u64, color_tag: ColorTag) {
        if value == 0 {
            return;
        }
        let idx = self.node(name);
        let node = &mut self.nodes[idx];
        node.sink = true;
        node.count += value;
        self.link(source, idx, value, color_tag);
    }

    fn finish(mut self) -> FlowGraph {
        for node in &mut self.nodes {
            node.label = format!("{} ({})", node.name, node.count);
        }
        FlowGraph {
            nodes: self.nodes,
            edges: self.edges,
        }
    }
}

fn stage_name(stage: usize) -> String {
    if stage == 1 {
        "First Interview".to_string()
    } else {
        format!("Interview {stage}")
    }
}

/// Builds the funnel graph from resolved company flows.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowGraphBuilder;

impl FlowGraphBuilder {
    pub fn build(&self, flows: &[CompanyFlow], sources: SourceCounts) -> FlowGraph {
        let buckets = OutcomeBuckets::from_flows(flows);
        let mut graph = GraphBuilder::default();

        let declared = sources.total_applications();
        let outflow = buckets.companies();
        let total_count = declared.max(outflow);

        let applied = (sources.applied > 0).then(|| graph.stage(APPLIED, sources.applied));
        let recruiter =
            (sources.confirmation > 0).then(|| graph.stage(RECRUITER, sources.confirmation));
        let total = graph.stage(TOTAL, total_count);
        if let Some(idx) = applied {
            graph.link(idx, total, sources.applied, ColorTag::Applied);
        }
        if let Some(idx) = recruiter {
            graph.link(idx, total, sources.confirmation, ColorTag::Applied);
        }

        // Outcomes without any interview.
        graph.sink(total, REJECTED, buckets.rejected[0], ColorTag::Rejected);
        graph.sink(total, WITHDREW, buckets.withdrew[0], ColorTag::Withdrew);
        graph.sink(total, GHOSTED, buckets.ghosted[0], ColorTag::Ghosted);

        // Interview chain; index 0 of `stage_nodes` stands for the total node.
        let max_stage = buckets.max_stage();
        let mut stage_nodes = vec![total];
        let mut previous = total;
        for stage in 1..=max_stage {
            let reaching = buckets.reaching(stage);
            let idx = graph.stage(&stage_name(stage), reaching);
            if buckets.ending_at(stage) == 0 {
                graph.nodes[idx].estimated = true;
                debug!(stage, reaching, "Inferred interview stage without direct outcomes");
            }
            graph.link(previous, idx, reaching, ColorTag::Interview);
            graph.sink(idx, REJECTED, buckets.rejected[stage], ColorTag::Rejected);
            graph.sink(idx, WITHDREW, buckets.withdrew[stage], ColorTag::Withdrew);
            graph.sink(idx, GHOSTED, buckets.ghosted[stage], ColorTag::Ghosted);
            stage_nodes.push(idx);
            previous = idx;
        }

        let offers = buckets.total_offers();
        if offers > 0 {
            let offer = graph.stage(OFFER, offers);
            for (stage, &from) in stage_nodes.iter().enumerate() {
                graph.link(from, offer, buckets.offer_by_stage[stage], ColorTag::Offer);
            }
            graph.sink(offer, ACCEPTED, buckets.accepted, ColorTag::Accepted);
            graph.sink(
                offer,
                DECLINED,
                buckets.offer + buckets.declined_offer,
                ColorTag::Declined,
            );
        }

        // Applications that never turned into a tracked company outcome.
        graph.sink(total, NO_REPLY, total_count - outflow, ColorTag::Ghosted);

        let graph = graph.finish();
        debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            companies = outflow,
            "Built funnel graph"
        );
        graph
    }
}
