//! Question branch graphs and the question bank.
//!
//! A graph is plain data: each question names, per choice answer, the next
//! question, plus a default edge taken by free-text answers and unmatched
//! choices. A question with no matching edge and no default ends the session.
//! Graphs are validated when built, so a session over a valid graph always
//! terminates.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, GraphError, Result, ValidationError};

/// Question id, unique within a graph.
pub type QuestionId = String;

// ============================================================================
// Question
// ============================================================================

/// Shape of the expected answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    FreeText,
    Choice { options: Vec<String> },
}

/// A node in the branch graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
    /// Choice answer (lowercase) to next question
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub edges: BTreeMap<String, QuestionId>,
    /// Taken by free-text answers and unmatched choices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_next: Option<QuestionId>,
}

impl Question {
    /// A free-text question.
    pub fn free_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            kind: QuestionKind::FreeText,
            edges: BTreeMap::new(),
            default_next: None,
        }
    }

    /// A multiple-choice question.
    pub fn choice<I, O>(id: impl Into<String>, text: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<String>,
    {
        Self {
            id: id.into(),
            text: text.into(),
            kind: QuestionKind::Choice {
                options: options.into_iter().map(Into::into).collect(),
            },
            edges: BTreeMap::new(),
            default_next: None,
        }
    }

    /// Route `answer` to `next`.
    pub fn on(mut self, answer: impl Into<String>, next: impl Into<String>) -> Self {
        self.edges.insert(answer.into().to_lowercase(), next.into());
        self
    }

    /// Set the default edge.
    pub fn then(mut self, next: impl Into<String>) -> Self {
        self.default_next = Some(next.into());
        self
    }

    pub fn options(&self) -> &[String] {
        match &self.kind {
            QuestionKind::Choice { options } => options,
            QuestionKind::FreeText => &[],
        }
    }

    /// Canonical option for a choice answer, matched case-insensitively.
    /// Free-text questions accept any non-empty answer as is.
    pub fn normalize_answer(&self, answer: &str) -> std::result::Result<String, ValidationError> {
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(ValidationError::MissingField("responseValue".to_string()));
        }

        match &self.kind {
            QuestionKind::FreeText => Ok(answer.to_string()),
            QuestionKind::Choice { options } => options
                .iter()
                .find(|o| o.eq_ignore_ascii_case(answer))
                .cloned()
                .ok_or_else(|| {
                    ValidationError::InvalidValue(format!(
                        "'{}' is not an option for question {} (expected one of: {})",
                        answer,
                        self.id,
                        options.join(", ")
                    ))
                }),
        }
    }

    /// Id of the question after `answer`.
    pub fn next_id(&self, answer: &str) -> Option<&QuestionId> {
        match self.kind {
            QuestionKind::Choice { .. } => self
                .edges
                .get(&answer.trim().to_lowercase())
                .or(self.default_next.as_ref()),
            QuestionKind::FreeText => self.default_next.as_ref(),
        }
    }

    fn targets(&self) -> impl Iterator<Item = &QuestionId> {
        self.edges.values().chain(self.default_next.iter())
    }
}

// ============================================================================
// Question Graph
// ============================================================================

/// The validated branch graph for one session type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionGraph {
    session_type: String,
    start: Option<QuestionId>,
    questions: Vec<Question>,
    #[serde(skip)]
    index: HashMap<QuestionId, usize>,
}

impl QuestionGraph {
    /// Build and validate a graph. Without `start`, the first question starts.
    pub fn new(
        session_type: impl Into<String>,
        start: Option<QuestionId>,
        questions: Vec<Question>,
    ) -> std::result::Result<Self, GraphError> {
        let mut index = HashMap::with_capacity(questions.len());
        for (i, question) in questions.iter().enumerate() {
            if index.insert(question.id.clone(), i).is_some() {
                return Err(GraphError::DuplicateQuestion(question.id.clone()));
            }
        }

        let start = start.or_else(|| questions.first().map(|q| q.id.clone()));
        if let Some(start) = &start {
            if !index.contains_key(start) {
                return Err(GraphError::MissingStart(start.clone()));
            }
        }

        for question in &questions {
            for target in question.targets() {
                if !index.contains_key(target) {
                    return Err(GraphError::UnknownTarget {
                        from: question.id.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        let graph = Self {
            session_type: session_type.into(),
            start,
            questions,
            index,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    /// A graph with no questions; sessions over it start complete.
    pub fn empty(session_type: impl Into<String>) -> Self {
        Self {
            session_type: session_type.into(),
            start: None,
            questions: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn session_type(&self) -> &str {
        &self.session_type
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// The start question, `None` for an empty graph.
    pub fn first(&self) -> Option<&Question> {
        self.start.as_ref().and_then(|id| self.get(id))
    }

    pub fn get(&self, id: &str) -> Option<&Question> {
        self.index.get(id).map(|&i| &self.questions[i])
    }

    /// The question that follows `answer` to question `current`.
    pub fn next(&self, current: &str, answer: &str) -> Option<&Question> {
        self.get(current)
            .and_then(|q| q.next_id(answer))
            .and_then(|id| self.get(id))
    }

    fn check_acyclic(&self) -> std::result::Result<(), GraphError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        let successors: Vec<Vec<usize>> = self
            .questions
            .iter()
            .map(|q| q.targets().filter_map(|t| self.index.get(t).copied()).collect())
            .collect();

        let mut marks = vec![Mark::New; self.questions.len()];
        // (question, successors already walked)
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for root in 0..self.questions.len() {
            if marks[root] != Mark::New {
                continue;
            }
            marks[root] = Mark::Active;
            stack.push((root, 0));

            while let Some(frame) = stack.last_mut() {
                let (i, walked) = *frame;
                match successors[i].get(walked) {
                    Some(&j) => {
                        frame.1 += 1;
                        match marks[j] {
                            Mark::Active => {
                                return Err(GraphError::Cycle(self.questions[j].id.clone()))
                            }
                            Mark::New => {
                                marks[j] = Mark::Active;
                                stack.push((j, 0));
                            }
                            Mark::Done => {}
                        }
                    }
                    None => {
                        marks[i] = Mark::Done;
                        stack.pop();
                    }
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Question Bank
// ============================================================================

/// On-disk form of one graph.
#[derive(Debug, Deserialize)]
struct GraphFile {
    #[serde(default)]
    start: Option<QuestionId>,
    #[serde(default)]
    questions: Vec<Question>,
}

/// Graphs keyed by session type.
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    graphs: HashMap<String, QuestionGraph>,
}

impl QuestionBank {
    /// An empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in session types: `property_feedback` and `quick_pulse`.
    pub fn builtin() -> Self {
        let mut bank = Self::new();
        bank.insert(property_feedback());
        bank.insert(quick_pulse());
        bank
    }

    /// Parse a bank from TOML, one table per session type:
    ///
    /// ```toml
    /// [quick_pulse]
    /// start = "rating"
    ///
    /// [[quick_pulse.questions]]
    /// id = "rating"
    /// text = "How was the viewing?"
    /// type = "choice"
    /// options = ["great", "poor"]
    /// edges = { poor = "issue" }
    ///
    /// [[quick_pulse.questions]]
    /// id = "issue"
    /// text = "What went wrong?"
    /// type = "free_text"
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let files: HashMap<String, GraphFile> =
            toml::from_str(content).map_err(ConfigError::Parse)?;

        let mut bank = Self::new();
        for (session_type, file) in files {
            let questions = file
                .questions
                .into_iter()
                .map(|mut q| {
                    q.edges = q
                        .edges
                        .into_iter()
                        .map(|(answer, next)| (answer.to_lowercase(), next))
                        .collect();
                    q
                })
                .collect();
            bank.insert(QuestionGraph::new(session_type, file.start, questions)?);
        }
        Ok(bank)
    }

    /// Load a bank from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        let bank = Self::from_toml_str(&content)?;
        tracing::info!(
            "Loaded {} session types from {}",
            bank.graphs.len(),
            path.as_ref().display()
        );
        Ok(bank)
    }

    /// Add or replace the graph for its session type.
    pub fn insert(&mut self, graph: QuestionGraph) {
        self.graphs.insert(graph.session_type().to_string(), graph);
    }

    /// The graph for `session_type`.
    pub fn get(&self, session_type: &str) -> std::result::Result<&QuestionGraph, ValidationError> {
        self.graphs
            .get(session_type)
            .ok_or_else(|| ValidationError::UnknownSessionType(session_type.to_string()))
    }

    /// Known session types, sorted.
    pub fn session_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.graphs.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

fn property_feedback() -> QuestionGraph {
    let questions = vec![
        Question::choice(
            "overall",
            "How did the viewing go overall?",
            ["loved it", "it was ok", "not for me"],
        )
        .on("not for me", "dealbreaker")
        .then("price"),
        Question::free_text(
            "dealbreaker",
            "What was the main reason this property didn't work for you?",
        )
        .then("comparison"),
        Question::free_text("price", "How do you feel about the rent for this property?")
            .then("amenities"),
        Question::free_text(
            "amenities",
            "Which amenities mattered most to you, and was anything missing?",
        )
        .then("location"),
        Question::free_text(
            "location",
            "What do you think of the location and the neighborhood?",
        )
        .then("size"),
        Question::free_text("size", "Did the size and layout work for you?").then("comparison"),
        Question::choice(
            "comparison",
            "Are you considering other properties?",
            ["yes", "no"],
        )
        .on("yes", "comparison_detail")
        .then("suggestions"),
        Question::free_text(
            "comparison_detail",
            "How does this property compare to the others you are considering?",
        )
        .then("suggestions"),
        Question::free_text("suggestions", "Is there anything we could improve?"),
    ];

    // Built-in data is known to be well formed.
    QuestionGraph::new("property_feedback", Some("overall".to_string()), questions)
        .unwrap_or_else(|_| QuestionGraph::empty("property_feedback"))
}

fn quick_pulse() -> QuestionGraph {
    let questions = vec![
        Question::choice(
            "rating",
            "How was the viewing?",
            ["great", "okay", "poor"],
        )
        .on("poor", "issue"),
        Question::free_text("issue", "Sorry to hear that. What went wrong?"),
    ];

    QuestionGraph::new("quick_pulse", Some("rating".to_string()), questions)
        .unwrap_or_else(|_| QuestionGraph::empty("quick_pulse"))
}
