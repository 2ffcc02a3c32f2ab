mod common;
mod pipeline_test;
mod routing_test;
mod scenarios_test;
