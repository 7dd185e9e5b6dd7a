pub mod http_flow;
pub mod match_flow;
