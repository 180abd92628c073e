use crate::heuristic;
use crate::kit::default_kit;
use crate::lenient;
use crate::normalize::exclude_kit_items;
use crate::oracle::{Oracle, OracleMessage};
use crate::prompt::{EMPTY_PREP_REPLY, PREP_PROMPT};
use crate::reply::{DEFAULT_PREP_REASON, parse_suggestions};
use crate::store::PrepStore;
use crate::types::{PrepItem, PrepResult, PrepSection};
use crate::{OracleError, RequestError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const SECTION_TITLE: &str = "Suggestion List";
pub const NO_ADDITIONAL_ITEM: &str = "No additional recommendations.";

const FALLBACK_REASON: &str = "Recommended based on your household profile and typical risks for similar households. This helps cover likely symptoms or minor injuries that may arise unexpectedly, especially during off-hours, travel, or when clinics are closed. It supports timely response when access to a pharmacy is limited and reduces delays in care. The item is commonly used for the types of situations noted in your family profile and is generally easy to administer with standard instructions. Keeping it on hand improves readiness for minor issues that can become more disruptive if untreated. It also helps avoid last-minute purchases during stressful moments. The suggestion aligns with common household readiness guidelines for mixed-age families.";
const FALLBACK_CAUTION: &str = "Read the label carefully and follow age-specific dosing instructions, especially for children and older adults. Check for interactions with existing conditions or medications such as blood pressure drugs, anticoagulants, or allergy medicines. Avoid duplicate ingredients across multiple products to prevent accidental overdosing. Use the lowest effective dose and do not exceed the maximum daily amount. Seek professional advice if symptoms are severe, persistent, or unusual. Store properly and discard any expired or compromised items. Keep out of reach of children and avoid sharing prescriptions or personal medications.";
const NO_ADDITIONAL_REASON: &str = "Your current supplies appear sufficient for the profile provided. No extra items are strongly indicated beyond what is typically kept in a basic kit. The household risk factors described do not point to specific additional needs at this time. This suggests your existing kit likely covers the most common minor issues for your group. It also indicates that the age mix and conditions reported do not require specialized OTC additions right now. Reassess after changes in health conditions, family composition, or travel habits. If new allergies or chronic conditions emerge, revisit the list for targeted items.";
const NO_ADDITIONAL_CAUTION: &str = "Review your kit periodically to ensure items are not expired and packaging is intact. Replace anything opened, heat-damaged, or compromised by moisture. Store medicines in a cool, dry place out of children's reach and away from direct sunlight. Keep an updated list of contents so you can spot gaps early. If anyone starts new medications, re-check for interactions with over-the-counter products. Dispose of expired items safely according to local guidelines. Keep dosing tools (syringes, cups) clean and available.";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrepRequest {
    #[serde(deserialize_with = "lenient::string")]
    pub context: String,
    /// Anything but a JSON number is treated as absent.
    #[serde(deserialize_with = "lenient::number")]
    pub family_count: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepResponse {
    pub result: PrepResult,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrepList {
    pub results: Vec<PrepResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cleared {
    pub ok: bool,
}

/// Household size from the request: absent, non-finite or non-positive means one.
pub fn resolve_family_count(value: Option<f64>) -> u32 {
    match value {
        Some(count) if count.is_finite() && count > 0.0 => count.ceil().min(u32::MAX as f64) as u32,
        _ => 1,
    }
}

/// Boilerplate item for a heuristic suggestion.
pub fn fallback_item(name: &str) -> PrepItem {
    PrepItem {
        name: name.to_string(),
        reason: FALLBACK_REASON.to_string(),
        caution: FALLBACK_CAUTION.to_string(),
    }
}

pub fn no_additional_item() -> PrepItem {
    PrepItem {
        name: NO_ADDITIONAL_ITEM.to_string(),
        reason: NO_ADDITIONAL_REASON.to_string(),
        caution: NO_ADDITIONAL_CAUTION.to_string(),
    }
}

fn heuristic_items(context: &str) -> Vec<PrepItem> {
    heuristic::suggest(context)
        .iter()
        .map(|name| fallback_item(name))
        .collect()
}

fn or_placeholder(items: Vec<PrepItem>) -> Vec<PrepItem> {
    if items.is_empty() {
        vec![no_additional_item()]
    } else {
        items
    }
}

/// Preparedness endpoint: list, generate, clear.
pub struct PrepService {
    oracle: Option<Box<dyn Oracle>>,
    store: PrepStore,
}

impl PrepService {
    pub fn new(oracle: Option<Box<dyn Oracle>>) -> Self {
        Self {
            oracle,
            store: PrepStore::new(),
        }
    }

    pub fn list(&self) -> PrepList {
        PrepList {
            results: self.store.list(),
        }
    }

    pub fn latest(&self) -> Option<PrepResult> {
        self.store.latest()
    }

    /// Generate, store and return suggestions for a household context.
    ///
    /// Only an empty context is an error. Without an oracle, or when the oracle
    /// call fails, the keyword heuristic answers and `fallback` is set.
    pub fn submit(&self, request: &PrepRequest) -> Result<PrepResponse, RequestError> {
        let context = request.context.trim();
        if context.is_empty() {
            return Err(RequestError::Validation("context is required".into()));
        }
        let family_count = resolve_family_count(request.family_count);
        let kit = default_kit(family_count);

        let Some(oracle) = self.oracle.as_deref() else {
            info!(family_count, "no oracle configured, using fallback suggestions");
            let result = self.append(or_placeholder(heuristic_items(context)), DEFAULT_PREP_REASON);
            return Ok(PrepResponse {
                result,
                fallback: true,
                error: None,
            });
        };

        match suggest_with_oracle(oracle, context, &kit) {
            Ok((items, reason)) => {
                let result = self.append(or_placeholder(items), &reason);
                Ok(PrepResponse {
                    result,
                    fallback: false,
                    error: None,
                })
            }
            Err(err) => {
                warn!(oracle = oracle.name(), error = %err, "oracle failed, using fallback suggestions");
                let result = self.append(or_placeholder(heuristic_items(context)), DEFAULT_PREP_REASON);
                Ok(PrepResponse {
                    result,
                    fallback: true,
                    error: Some(err.to_string()),
                })
            }
        }
    }

    pub fn clear(&self) -> Cleared {
        self.store.clear();
        Cleared { ok: true }
    }

    fn append(&self, items: Vec<PrepItem>, reason: &str) -> PrepResult {
        let count = items.len();
        let result = self.store.add(
            vec![PrepSection {
                title: SECTION_TITLE.to_string(),
                items,
            }],
            reason.to_string(),
        );
        info!(id = %result.id, items = count, "stored prep result");
        result
    }
}

/// Ask the oracle, parse its list, and drop anything the default kit already covers.
fn suggest_with_oracle(
    oracle: &dyn Oracle,
    context: &str,
    kit: &[String],
) -> Result<(Vec<PrepItem>, String), OracleError> {
    let messages = [OracleMessage::system(PREP_PROMPT), OracleMessage::user(context)];
    let raw = oracle.complete(&messages)?;
    let raw = match raw.trim() {
        "" => EMPTY_PREP_REPLY,
        text => text,
    };

    let reply = parse_suggestions(raw);
    let suggested = if reply.items.is_empty() {
        heuristic_items(context)
    } else {
        reply.items
    };
    Ok((exclude_kit_items(suggested, kit), reply.reason))
}
