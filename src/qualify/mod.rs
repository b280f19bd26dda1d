//! Lead qualification: scores leads and reads replies with an LLM.
//!
//! Model output is parsed against a strict schema. Anything that does not
//! match (extra keys, missing fields, out-of-range score) fails closed into
//! a `needs_review` result that never moves a lead's status.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::leads::model::{Lead, LeadStatus};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::mail::template::{COMPANY_FALLBACK, render_template};

/// Score at or above which a lead becomes `qualified`.
pub const QUALIFIED_THRESHOLD: i64 = 70;
/// Score below which a lead becomes `unqualified`.
pub const UNQUALIFIED_THRESHOLD: i64 = 30;

const MANUAL_REVIEW: &str = "Manual review required";

/// Qualification outcome, stored on the lead as `qualification_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Qualification {
    pub is_qualified: bool,
    pub score: i64,
    pub rationale: String,
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    /// Set when the model could not be used; the result carries no signal.
    #[serde(default)]
    pub needs_review: bool,
}

impl Qualification {
    /// Safe default used whenever the model is unavailable or misbehaves.
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            is_qualified: false,
            score: 0,
            rationale: reason.into(),
            next_steps: vec![MANUAL_REVIEW.to_string()],
            reasons: Vec::new(),
            summary: None,
            needs_review: true,
        }
    }

    /// Status the lead should move to given its current status.
    pub fn resulting_status(&self, current: LeadStatus) -> LeadStatus {
        if self.needs_review {
            return current;
        }
        status_for_score(current, self.score)
    }
}

/// Threshold rule: `>= 70` qualifies, `< 30` disqualifies, otherwise keep.
pub fn status_for_score(current: LeadStatus, score: i64) -> LeadStatus {
    if score >= QUALIFIED_THRESHOLD {
        LeadStatus::Qualified
    } else if score < UNQUALIFIED_THRESHOLD {
        LeadStatus::Unqualified
    } else {
        current
    }
}

/// Wire schema the model must produce for qualification.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct QualificationReply {
    is_qualified: bool,
    score: i64,
    rationale: String,
    next_steps: Vec<String>,
    #[serde(default)]
    reasons: Vec<String>,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    ScheduleCall,
    SendFollowup,
    Nurture,
    Disqualify,
}

/// Reading of a lead's email reply, stored as `response_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseAnalysis {
    pub has_response: bool,
    pub sentiment: Sentiment,
    pub is_interested: bool,
    pub questions: Vec<String>,
    pub concerns: Vec<String>,
    pub next_action: NextAction,
    #[serde(default)]
    pub needs_review: bool,
}

impl ResponseAnalysis {
    pub fn fallback() -> Self {
        Self {
            has_response: true,
            sentiment: Sentiment::Neutral,
            is_interested: false,
            questions: Vec::new(),
            concerns: vec!["Analysis failed".to_string()],
            next_action: NextAction::SendFollowup,
            needs_review: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AnalysisReply {
    has_response: bool,
    sentiment: Sentiment,
    is_interested: bool,
    #[serde(default)]
    questions: Vec<String>,
    #[serde(default)]
    concerns: Vec<String>,
    next_action: NextAction,
}

/// LLM-backed qualifier. Without a provider every call returns its fallback.
#[derive(Clone)]
pub struct Qualifier {
    llm: Option<Arc<dyn LlmProvider>>,
}

impl Qualifier {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>) -> Self {
        Self { llm }
    }

    pub fn disabled() -> Self {
        Self { llm: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.llm.is_some()
    }

    pub fn model_name(&self) -> Option<&str> {
        self.llm.as_ref().map(|l| l.model_name())
    }

    /// Score a lead. Never fails; errors become a `needs_review` result.
    pub async fn qualify(&self, lead: &Lead, response_text: Option<&str>) -> Qualification {
        match self.try_qualify(lead, response_text).await {
            Ok(q) => {
                debug!(lead_id = lead.id, score = q.score, "Lead qualified by model");
                q
            }
            Err(LlmError::NotConfigured) => {
                Qualification::fallback("No language model configured")
            }
            Err(e) => {
                warn!(lead_id = lead.id, error = %e, "Qualification failed, falling back to manual review");
                Qualification::fallback(format!("Automatic qualification failed: {e}"))
            }
        }
    }

    async fn try_qualify(
        &self,
        lead: &Lead,
        response_text: Option<&str>,
    ) -> Result<Qualification, LlmError> {
        let llm = self.llm.as_ref().ok_or(LlmError::NotConfigured)?;

        let request = CompletionRequest::new(vec![
            ChatMessage::system(
                "You are a sales qualification expert. Respond with a single valid JSON object only.",
            ),
            ChatMessage::user(qualification_prompt(lead, response_text)),
        ])
        .with_temperature(0.3)
        .with_json_mode();

        let response = llm.complete(request).await?;
        parse_qualification(llm.model_name(), &response.content)
    }

    /// Read a reply. Never fails; errors become a neutral analysis.
    pub async fn analyze_response(&self, lead: &Lead, text: &str) -> ResponseAnalysis {
        let Some(llm) = self.llm.as_ref() else {
            return ResponseAnalysis::fallback();
        };

        let request = CompletionRequest::new(vec![
            ChatMessage::system(
                "You are an email response analyzer. Respond with a single valid JSON object only.",
            ),
            ChatMessage::user(analysis_prompt(lead, text)),
        ])
        .with_temperature(0.3)
        .with_json_mode();

        let result = match llm.complete(request).await {
            Ok(response) => parse_analysis(llm.model_name(), &response.content),
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            warn!(lead_id = lead.id, error = %e, "Response analysis failed, using neutral fallback");
            ResponseAnalysis::fallback()
        })
    }

    /// Personalise a template body. Falls back to plain substitution.
    pub async fn personalize(&self, lead: &Lead, body: &str) -> String {
        let Some(llm) = self.llm.as_ref() else {
            return render_template(body, lead);
        };

        let request = CompletionRequest::new(vec![
            ChatMessage::system(
                "You are an expert at personalizing sales emails. Keep the tone professional and helpful.",
            ),
            ChatMessage::user(personalize_prompt(lead, body)),
        ])
        .with_temperature(0.7);

        match llm.complete(request).await {
            Ok(response) if !response.content.trim().is_empty() => {
                render_template(response.content.trim(), lead)
            }
            Ok(_) => render_template(body, lead),
            Err(e) => {
                warn!(lead_id = lead.id, error = %e, "Personalization failed, using template");
                render_template(body, lead)
            }
        }
    }
}

fn qualification_prompt(lead: &Lead, response_text: Option<&str>) -> String {
    let mut prompt = format!(
        "Analyze the following lead and decide whether they are qualified using these criteria:
- Budget: can they afford the solution
- Authority: are they a decision maker or influencer
- Need: do they have clear pain points we can solve
- Timeline: are they looking to implement within 6 months

Lead information:
- Name: {}
- Company: {}
- Role: {}
- Email: {}
",
        lead.name,
        lead.company.as_deref().unwrap_or("Not provided"),
        lead.role.as_deref().unwrap_or("Not provided"),
        lead.email,
    );
    if let Some(text) = response_text {
        prompt.push_str(&format!("- Response: {text}\n"));
    }
    prompt.push_str(
        "
Reply with a JSON object containing exactly these keys:
- isQualified: boolean
- score: integer from 0 to 100
- rationale: string explaining the decision
- nextSteps: array of strings with suggested next actions
- reasons: array of strings (optional)
- summary: string (optional)",
    );
    prompt
}

fn analysis_prompt(lead: &Lead, text: &str) -> String {
    format!(
        "Analyze this email reply from a potential customer.

Lead: {} from {}
Reply: \"{}\"

Reply with a JSON object containing exactly these keys:
- hasResponse: boolean (true if this is a meaningful response)
- sentiment: \"positive\" | \"negative\" | \"neutral\"
- isInterested: boolean
- questions: array of questions they asked
- concerns: array of concerns they raised
- nextAction: \"schedule_call\" | \"send_followup\" | \"nurture\" | \"disqualify\"",
        lead.name,
        lead.company.as_deref().unwrap_or("an unknown company"),
        text,
    )
}

fn personalize_prompt(lead: &Lead, body: &str) -> String {
    format!(
        "Personalize this email template for the following lead.

Lead information:
- Name: {}
- Company: {}
- Role: {}

Email template:
{}

Instructions:
1. Replace {{{{name}}}} with the lead's name
2. Replace {{{{company}}}} with the lead's company name
3. Add 1-2 sentences specifically relevant to their role and company
4. Keep the professional tone and structure

Return only the personalized email body.",
        lead.name,
        lead.company_or(COMPANY_FALLBACK),
        lead.role.as_deref().unwrap_or("their role"),
        body,
    )
}

fn parse_qualification(provider: &str, content: &str) -> Result<Qualification, LlmError> {
    let json = extract_json_object(content);
    let reply: QualificationReply =
        serde_json::from_str(&json).map_err(|e| LlmError::InvalidResponse {
            provider: provider.to_string(),
            reason: format!("qualification schema mismatch: {e}"),
        })?;

    if !(0..=100).contains(&reply.score) {
        return Err(LlmError::InvalidResponse {
            provider: provider.to_string(),
            reason: format!("score {} is outside 0..=100", reply.score),
        });
    }

    Ok(Qualification {
        is_qualified: reply.is_qualified,
        score: reply.score,
        rationale: reply.rationale,
        next_steps: reply.next_steps,
        reasons: reply.reasons,
        summary: reply.summary,
        needs_review: false,
    })
}

fn parse_analysis(provider: &str, content: &str) -> Result<ResponseAnalysis, LlmError> {
    let json = extract_json_object(content);
    let reply: AnalysisReply =
        serde_json::from_str(&json).map_err(|e| LlmError::InvalidResponse {
            provider: provider.to_string(),
            reason: format!("analysis schema mismatch: {e}"),
        })?;

    Ok(ResponseAnalysis {
        has_response: reply.has_response,
        sentiment: reply.sentiment,
        is_interested: reply.is_interested,
        questions: reply.questions,
        concerns: reply.concerns,
        next_action: reply.next_action,
        needs_review: false,
    })
}

/// Pull a JSON object out of a reply that may be wrapped in prose or fences.
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}
