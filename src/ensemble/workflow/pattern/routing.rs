// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use super::config::{AgentSlot, PatternConfig, WorkflowPattern};
use super::invoke::invoke_slot;
use super::parallel::run_concurrently;
use super::result::{AgentStepResult, WorkflowResult};
use super::PatternExecutor;

/// Lets a routing agent pick which agent(s) handle the input
pub struct RoutingExecutor;

#[async_trait]
impl PatternExecutor for RoutingExecutor {
    fn pattern(&self) -> WorkflowPattern {
        WorkflowPattern::Routing
    }

    async fn execute(&self, input: &str, config: &PatternConfig) -> WorkflowResult {
        let mut result = WorkflowResult::new(Some(WorkflowPattern::Routing));
        let Some(router) = &config.routing_agent else {
            return result.fail("routing pattern requires a routing agent");
        };

        let candidates: Vec<&AgentSlot> = config.enabled_agents().collect();
        if candidates.is_empty() {
            return result.fail("no enabled agents");
        }

        let prompt = routing_prompt(config, &candidates, input);
        result.log_step(&router.name, "route", format!("{} candidates", candidates.len()));
        let decision_step = invoke_slot(router, prompt, config.verbose_logging).await;
        let decision = decision_step
            .output
            .as_deref()
            .filter(|_| decision_step.succeeded())
            .map(|d| d.trim().to_string());
        let failure = decision_step.error_text();
        result.record(decision_step);
        let Some(decision) = decision else {
            return result.fail(format!("Routing agent '{}' failed: {}", router.name, failure));
        };

        let chosen = parse_decision(&decision, &candidates, config.multi_routing);
        if chosen.is_empty() {
            log::error!("Routing decision '{}' matches no agent", decision);
            return result.fail(format!("Routing decision '{}' matches no agent", decision));
        }

        let targets: Vec<AgentSlot> = chosen.iter().map(|&i| candidates[i].clone()).collect();
        let names: Vec<&str> = targets.iter().map(|t| t.name.as_str()).collect();
        log::info!("Routing '{}' to {}", truncate(input, 60), names.join(", "));
        result.log_step(&router.name, "decision", names.join(", "));

        let steps: Vec<AgentStepResult> = if let [single] = targets.as_slice() {
            result.log_step(&single.name, "invoke", "routed");
            vec![invoke_slot(single, input.to_string(), config.verbose_logging).await]
        } else {
            for target in &targets {
                result.log_step(&target.name, "invoke", "routed concurrently");
            }
            run_concurrently(&targets, input, config.verbose_logging).await
        };

        let succeeded: Vec<(String, String)> = steps
            .iter()
            .filter(|s| s.succeeded())
            .filter_map(|s| s.output.clone().map(|o| (s.agent_name.clone(), o)))
            .collect();
        let errors: Vec<String> = steps
            .iter()
            .filter(|s| !s.succeeded())
            .map(|s| format!("Agent '{}' failed: {}", s.agent_name, s.error_text()))
            .collect();
        for step in steps {
            result.record(step);
        }

        match succeeded.as_slice() {
            [] => result.fail(errors.join("; ")),
            [(_, output)] if errors.is_empty() => {
                let output = output.clone();
                result.succeed(output)
            }
            many => {
                let combined = many
                    .iter()
                    .map(|(name, output)| format!("[{}]\n{}", name, output))
                    .chain(errors.iter().cloned())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                result.succeed(combined)
            }
        }
    }
}

fn agent_list(candidates: &[&AgentSlot]) -> String {
    candidates
        .iter()
        .map(|a| format!("- name: {}, description: {}", a.name, a.description))
        .collect::<Vec<_>>()
        .join("\n")
}

fn routing_prompt(config: &PatternConfig, candidates: &[&AgentSlot], input: &str) -> String {
    let agents = agent_list(candidates);
    match config.routing_prompt.as_deref() {
        Some(custom) if !custom.trim().is_empty() => format!(
            "{}\n\nAvailable agents:\n{}\n\nUser request: {}",
            custom, agents, input
        ),
        _ => {
            let reply = if config.multi_routing {
                "Reply with the names of every agent that should handle it, separated by commas, and nothing else."
            } else {
                "Reply with only the name of the single best agent and nothing else."
            };
            format!(
                "You are a router. Choose which agent should handle the user request.\n\n\
                 Available agents:\n{}\n\nUser request: {}\n\n{}",
                agents, input, reply
            )
        }
    }
}

/// Indices of the agents named by a routing decision
pub(crate) fn parse_decision(decision: &str, candidates: &[&AgentSlot], multi: bool) -> Vec<usize> {
    if !multi {
        return match_one(decision, candidates).into_iter().collect();
    }

    let mut chosen = Vec::new();
    for part in decision.split([',', '\n']) {
        if let Some(i) = match_one(part, candidates) {
            if !chosen.contains(&i) {
                chosen.push(i);
            }
        }
    }
    chosen
}

fn match_one(decision: &str, candidates: &[&AgentSlot]) -> Option<usize> {
    let cleaned = decision
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '_' && c != '-');
    if cleaned.is_empty() {
        return None;
    }

    if let Some(i) = candidates
        .iter()
        .position(|a| a.name.eq_ignore_ascii_case(cleaned))
    {
        return Some(i);
    }

    // whole-word match, earliest mention wins
    let words: Vec<String> = cleaned
        .split(|c: char| !c.is_alphanumeric() && c != '_' && c != '-')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    words.iter().find_map(|word| {
        candidates
            .iter()
            .position(|a| a.name.to_lowercase() == *word)
    })
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((i, _)) => format!("{}...", &text[..i]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::workflow::pattern::tests::{RecordingAgent, ScriptedAgent};
    use std::sync::Arc;

    struct Team {
        a: Arc<RecordingAgent>,
        b: Arc<RecordingAgent>,
        c: Arc<RecordingAgent>,
    }

    fn team() -> Team {
        Team {
            a: Arc::new(RecordingAgent::new("a", "-a")),
            b: Arc::new(RecordingAgent::new("b", "-b")),
            c: Arc::new(RecordingAgent::new("c", "-c")),
        }
    }

    fn config(team: &Team, decision: &str) -> PatternConfig {
        PatternConfig::new(WorkflowPattern::Routing)
            .agent(AgentSlot::new(team.a.clone()))
            .agent(AgentSlot::new(team.b.clone()))
            .agent(AgentSlot::new(team.c.clone()))
            .route_with(AgentSlot::new(Arc::new(ScriptedAgent::new("router", decision))), None)
    }

    fn slots(names: &[&str]) -> Vec<AgentSlot> {
        names
            .iter()
            .map(|n| AgentSlot::new(Arc::new(RecordingAgent::new(n, ""))))
            .collect()
    }

    #[tokio::test]
    async fn test_routes_to_single_agent() {
        let team = team();
        let result = RoutingExecutor.execute("task", &config(&team, "b")).await;

        assert!(result.success);
        assert_eq!(result.final_result.as_deref(), Some("task-b"));
        assert_eq!((team.a.calls(), team.b.calls(), team.c.calls()), (0, 1, 0));
    }

    #[tokio::test]
    async fn test_unknown_decision_fails() {
        let team = team();
        let result = RoutingExecutor.execute("task", &config(&team, "z")).await;

        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("'z'"));
        assert_eq!(team.a.calls() + team.b.calls() + team.c.calls(), 0);
    }

    #[tokio::test]
    async fn test_multi_routing_runs_each_choice() {
        let team = team();
        let result = RoutingExecutor
            .execute("task", &config(&team, "a, c").multi_routing(true))
            .await;

        assert!(result.success);
        assert_eq!((team.a.calls(), team.b.calls(), team.c.calls()), (1, 0, 1));
        assert_eq!(
            result.final_result.as_deref(),
            Some("[a]\ntask-a\n\n[c]\ntask-c")
        );
    }

    #[tokio::test]
    async fn test_routing_prompt_lists_agents() {
        let router = Arc::new(RecordingAgent::new("router", ""));
        let team = team();
        let config = PatternConfig::new(WorkflowPattern::Routing)
            .agent(AgentSlot::new(team.a.clone()).with_description("first"))
            .route_with(AgentSlot::new(router.clone()), Some("Pick one.".to_string()));

        RoutingExecutor.execute("task", &config).await;
        let prompt = &router.inputs()[0];
        assert!(prompt.starts_with("Pick one.\n\nAvailable agents:\n- name: a, description: first"));
        assert!(prompt.ends_with("User request: task"));
    }

    #[test]
    fn test_parse_decision() {
        let owned = slots(&["researcher", "writer", "critic"]);
        let candidates: Vec<&AgentSlot> = owned.iter().collect();

        assert_eq!(parse_decision("Writer", &candidates, false), vec![1]);
        assert_eq!(parse_decision("  \"critic\".", &candidates, false), vec![2]);
        assert_eq!(
            parse_decision("I would ask the researcher first", &candidates, false),
            vec![0]
        );
        assert!(parse_decision("rewriter", &candidates, false).is_empty());
        assert_eq!(
            parse_decision("critic,\nwriter, critic", &candidates, true),
            vec![2, 1]
        );
    }
}
