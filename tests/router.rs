use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use wikirag::llm::{LlmProvider, ProviderRequest};
use wikirag::router::GENERIC_ERROR_MESSAGE;
use wikirag::{
    ChunkingConfig, ContentSource, Embedder, ExecutionBudget, Page, PublicError, Reply, Result,
    RetrievalError, RetrievalPipeline, RetrievalSettings, RetrievalTool, Router, RouterConfig,
    SummaryConfig, SummaryFallbackTool, SummarySource, ToolLoopAgent,
};

const SEGMENT: usize = 40;

fn page_text() -> String {
    [
        "Paris is the capital of France.",
        "The tower was built in 1889.",
        "Its height is 330 metres.",
    ]
    .iter()
    .map(|sentence| format!("{sentence:<SEGMENT$}"))
    .collect()
}

struct Encyclopedia {
    page_fetches: Mutex<Vec<String>>,
    summary_titles: Mutex<Vec<String>>,
    summary_failures: Mutex<usize>,
}

impl Encyclopedia {
    fn new(summary_failures: usize) -> Arc<Self> {
        Arc::new(Self {
            page_fetches: Mutex::new(Vec::new()),
            summary_titles: Mutex::new(Vec::new()),
            summary_failures: Mutex::new(summary_failures),
        })
    }
}

impl ContentSource for Encyclopedia {
    fn fetch_page_content(&self, title: &str) -> Result<Page> {
        self.page_fetches.lock().unwrap().push(title.to_string());
        if title != "Eiffel Tower" {
            return Err(RetrievalError::NotFound(title.to_string()));
        }
        Ok(Page {
            title: title.to_string(),
            raw_text: page_text(),
        })
    }
}

impl SummarySource for Encyclopedia {
    fn fetch_summary(&self, title: &str, _timeout: Duration) -> Result<String> {
        self.summary_titles.lock().unwrap().push(title.to_string());
        let mut failures = self.summary_failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(RetrievalError::Upstream {
                service: "wikipedia-summary",
                status: 503,
                body: "upstream secret detail".into(),
            });
        }
        Ok(format!("{title} is a wrought-iron lattice tower in Paris."))
    }
}

/// Feature vector keyed on a few topic words.
struct KeywordEmbedder;

impl Embedder for KeywordEmbedder {
    fn embed(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(inputs
            .iter()
            .map(|text| {
                let has = |word: &str| if text.contains(word) { 1.0 } else { 0.0 };
                vec![has("built"), has("height"), has("capital"), 0.05]
            })
            .collect())
    }

    fn model(&self) -> &str {
        "keyword-test"
    }
}

struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    last_turn: Mutex<Option<String>>,
}

impl ScriptedLlm {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|reply| reply.to_string()).collect()),
            last_turn: Mutex::new(None),
        })
    }
}

impl LlmProvider for ScriptedLlm {
    fn answer(&self, request: &ProviderRequest<'_>) -> Result<String> {
        *self.last_turn.lock().unwrap() = request
            .messages
            .last()
            .map(|message| message.content.clone());
        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "Thought: still thinking".to_string()))
    }
}

fn settings() -> RetrievalSettings {
    RetrievalSettings {
        chunking: ChunkingConfig {
            passage_tokens: SEGMENT / 4,
            overlap_tokens: 0,
            chars_per_token: 4,
        },
        max_results: 2,
    }
}

fn router(encyclopedia: Arc<Encyclopedia>, llm: Arc<ScriptedLlm>) -> Router {
    let pipeline = RetrievalPipeline::new(encyclopedia.clone(), Arc::new(KeywordEmbedder));
    let config = RouterConfig {
        summary: SummaryConfig {
            max_retries: 3,
            timeout_ms: 5000,
            backoff: Duration::ZERO,
        },
        budget: ExecutionBudget::default(),
    };
    Router::new(
        SummaryFallbackTool::new(encyclopedia, Duration::ZERO),
        Arc::new(ToolLoopAgent::new(llm, Default::default())),
        RetrievalTool::new(pipeline, settings()),
        config,
    )
}

const LOOKUP: &str = "Thought: I should check the page.\nAction: wikipedia\nAction Input: {\"page\": \"Eiffel Tower\", \"query\": \"when was it built\"}";

#[test]
fn summary_queries_are_answered_from_the_page_summary() {
    let encyclopedia = Encyclopedia::new(0);
    let llm = ScriptedLlm::new(&[]);
    let router = router(encyclopedia.clone(), llm.clone());

    let reply = router
        .handle("Quick summary of the Eiffel Tower")
        .unwrap();

    assert_eq!(
        reply,
        Reply {
            reply: "Eiffel Tower is a wrought-iron lattice tower in Paris.".to_string()
        }
    );
    assert_eq!(
        *encyclopedia.summary_titles.lock().unwrap(),
        vec!["Eiffel Tower".to_string()]
    );
    assert!(encyclopedia.page_fetches.lock().unwrap().is_empty());
    assert_eq!(*llm.last_turn.lock().unwrap(), None);
}

#[test]
fn transient_summary_failures_are_retried() {
    let encyclopedia = Encyclopedia::new(2);
    let router = router(encyclopedia.clone(), ScriptedLlm::new(&[]));

    let reply = router.handle("short summary of the Eiffel Tower").unwrap();

    assert_eq!(reply.reply, "Eiffel Tower is a wrought-iron lattice tower in Paris.");
    assert_eq!(encyclopedia.summary_titles.lock().unwrap().len(), 3);
}

#[test]
fn exhausted_summary_retries_surface_only_the_generic_message() {
    let encyclopedia = Encyclopedia::new(10);
    let router = router(encyclopedia.clone(), ScriptedLlm::new(&[]));

    let err = router.handle("quick overview of the Eiffel Tower").unwrap_err();

    assert_eq!(err, PublicError);
    assert_eq!(err.to_string(), GENERIC_ERROR_MESSAGE);
    assert!(!err.to_string().contains("secret"));
    assert_eq!(encyclopedia.summary_titles.lock().unwrap().len(), 3);
}

#[test]
fn detailed_questions_go_through_the_agent_and_ranked_passages() {
    let encyclopedia = Encyclopedia::new(0);
    let llm = ScriptedLlm::new(&[LOOKUP, "Thought: done.\nFinal Answer: It was built in 1889."]);
    let router = router(encyclopedia.clone(), llm.clone());

    let reply = router
        .handle("Explain when and why the Eiffel Tower was constructed")
        .unwrap();

    assert_eq!(reply.reply, "It was built in 1889.");
    assert_eq!(
        *encyclopedia.page_fetches.lock().unwrap(),
        vec!["Eiffel Tower".to_string()]
    );
    assert!(encyclopedia.summary_titles.lock().unwrap().is_empty());

    let observation = llm.last_turn.lock().unwrap().clone().unwrap();
    assert!(observation.starts_with("Observation: "));
    let best = observation.find("built in 1889").unwrap();
    let runner_up = observation.find("330 metres").or_else(|| observation.find("capital"));
    assert!(runner_up.map_or(true, |pos| best < pos));
}

#[test]
fn direct_retrieval_ranks_the_matching_window_first() {
    let pipeline = RetrievalPipeline::new(Encyclopedia::new(0), Arc::new(KeywordEmbedder));

    let result = pipeline
        .retrieve("Eiffel Tower", "when was it built", &settings())
        .unwrap();

    assert_eq!(result.page_title, "Eiffel Tower");
    assert_eq!(result.passages.len(), 2);
    assert_eq!(result.passages[0].chunk.index, 1);
    assert_eq!(result.passages[0].chunk.start_offset, SEGMENT);
    assert!(result.passages[0].score > result.passages[1].score);
}

#[test]
fn agent_budget_overruns_are_hidden_behind_the_generic_message() {
    let encyclopedia = Encyclopedia::new(0);
    // Every turn is unparseable, so the step retry budget runs out.
    let llm = ScriptedLlm::new(&[]);
    let router = router(encyclopedia, llm);

    assert_eq!(
        router.handle("Describe the architecture of the Eiffel Tower"),
        Err(PublicError)
    );
}

#[test]
fn blank_queries_fail_with_the_generic_message() {
    let router = router(Encyclopedia::new(0), ScriptedLlm::new(&[]));
    assert_eq!(router.handle("   "), Err(PublicError));
}

#[test]
fn summary_lookups_keep_title_words_outside_the_stopword_set() {
    let encyclopedia = Encyclopedia::new(0);
    let router = router(encyclopedia.clone(), ScriptedLlm::new(&[]));

    router.handle("quick summary of A Beautiful Mind").unwrap();
    router.handle("short summary of Tell Me Why").unwrap();

    assert_eq!(
        *encyclopedia.summary_titles.lock().unwrap(),
        vec!["A Beautiful Mind".to_string(), "Tell Me Why".to_string()]
    );
}
