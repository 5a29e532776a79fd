// SPDX-License-Identifier: MIT

//! Built-in deep research graph
//!
//! ```text
//! START -> query_decomposition -> split_questions -> information_gathering
//!       -> analysis -> synthesis -> quality_check -> score -> count_iteration
//!       -> (quality gate) -> END | information_gathering
//! ```

use serde_json::json;

use super::config::{EdgeConfig, GraphConfig, NodeConfig, END, START};
use super::router::RouterConfig;
use crate::ensemble::workflow::state::StateKey;

pub const DEEP_RESEARCH_GRAPH: &str = "deep_research";
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;
pub const DEFAULT_QUALITY_THRESHOLD: f64 = 80.0;
const MAX_SUB_QUESTIONS: usize = 5;

const DECOMPOSITION_PROMPT: &str = "You are a research planner. Break the question into at most \
five focused sub-questions that together cover it. Reply with one sub-question per line and \
nothing else.";

const GATHERING_PROMPT: &str = "You are a research assistant. For each sub-question, collect \
the relevant facts, figures and sources you know of. Be specific and note uncertainty.";

const ANALYSIS_PROMPT: &str = "You are an analyst. Examine the gathered information, identify \
the key findings, conflicts and gaps, and explain how they answer the question.";

const SYNTHESIS_PROMPT: &str = "You are a technical writer. Using the question and the analysis, \
write a complete, well-structured answer. If a previous quality report is present, address \
its criticism.";

const QUALITY_PROMPT: &str = "You are a strict reviewer. Rate the answer for accuracy, \
completeness and clarity. Start your reply with `Score: N` where N is 0-100, then list concrete \
improvements.";

fn llm(id: &str, name: &str, inputs: &[&str], output: &str, prompt: &str) -> NodeConfig {
    let mut node = NodeConfig::new(id, "LLM_NODE")
        .param("output_key", json!(output))
        .param("system_prompt", json!(prompt));
    node.name = name.to_string();
    match inputs {
        [single] => node.param("input_key", json!(single)),
        many => node.param("input_keys", json!(many)),
    }
}

fn transform(id: &str, kind: &str, input: &str, output: &str) -> NodeConfig {
    NodeConfig::new(id, "TRANSFORM_NODE")
        .param("transform_type", json!(kind))
        .param("input_keys", json!([input]))
        .param("output_key", json!(output))
}

/// Deep research graph with a quality-gated refinement loop
pub fn deep_research_graph(max_iterations: u32, threshold: f64) -> GraphConfig {
    let mut config = GraphConfig::new(DEEP_RESEARCH_GRAPH)
        .key(StateKey::replace("question").with_description("The research question"))
        .key(StateKey::replace("decomposition"))
        .key(StateKey::append("sub_questions"))
        .key(StateKey::append("search_results"))
        .key(StateKey::replace("analysis"))
        .key(StateKey::replace("final_answer"))
        .key(StateKey::replace("quality_report"))
        .key(StateKey::replace("quality_score").with_default(json!(0)))
        .key(StateKey::replace("iteration_count").with_default(json!(0)))
        .key(StateKey::replace("current_node"))
        .key(StateKey::replace("error_message"))
        .node(llm(
            "query_decomposition",
            "Query decomposition",
            &["question"],
            "decomposition",
            DECOMPOSITION_PROMPT,
        ))
        .node(
            transform("split_questions", "SPLIT_LINES", "decomposition", "sub_questions")
                .param("max_items", json!(MAX_SUB_QUESTIONS)),
        )
        .node(llm(
            "information_gathering",
            "Information gathering",
            &["question", "sub_questions", "quality_report"],
            "search_results",
            GATHERING_PROMPT,
        ))
        .node(llm(
            "analysis",
            "Analysis",
            &["question", "search_results"],
            "analysis",
            ANALYSIS_PROMPT,
        ))
        .node(llm(
            "synthesis",
            "Synthesis",
            &["question", "analysis", "quality_report"],
            "final_answer",
            SYNTHESIS_PROMPT,
        ))
        .node(llm(
            "quality_check",
            "Quality check",
            &["question", "final_answer"],
            "quality_report",
            QUALITY_PROMPT,
        ))
        .node(transform("score", "PARSE_NUMBER", "quality_report", "quality_score"))
        .node(transform(
            "count_iteration",
            "INCREMENT",
            "iteration_count",
            "iteration_count",
        ))
        .edge(EdgeConfig::simple(START, "query_decomposition"))
        .edge(EdgeConfig::simple("query_decomposition", "split_questions"))
        .edge(EdgeConfig::simple("split_questions", "information_gathering"))
        .edge(EdgeConfig::simple("information_gathering", "analysis"))
        .edge(EdgeConfig::simple("analysis", "synthesis"))
        .edge(EdgeConfig::simple("synthesis", "quality_check"))
        .edge(EdgeConfig::simple("quality_check", "score"))
        .edge(EdgeConfig::simple("score", "count_iteration"))
        .edge(
            EdgeConfig::conditional(
                "count_iteration",
                &[("end", END), ("iterate", "information_gathering")],
            )
            .with_router(RouterConfig::quality_gate(
                "quality_score",
                threshold,
                "iteration_count",
                max_iterations,
            )),
        );

    config.description = "Decompose, gather, analyse, synthesise and review until the answer \
passes the quality gate"
        .to_string();
    config.version = Some("1.0".to_string());
    config
}

/// Preset with default limits
pub fn default_deep_research_graph() -> GraphConfig {
    deep_research_graph(DEFAULT_MAX_ITERATIONS, DEFAULT_QUALITY_THRESHOLD)
}
