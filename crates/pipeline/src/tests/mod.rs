//! Pipeline scenarios driven by a fake model client.


mod pipeline_flow;
