//! Cross-subsystem integration flows.

mod consensus_clusters;
mod event_routing;
mod swarm_flows;
mod topology_transitions;
