//! Clinical coding of a record from the views and codes tables.

mod private_view;

use tracing::{debug, warn};

use crate::code_table::{split_tokens, CodeSource, ViewDefinition};
use crate::models::{
    normalize_view_keyword, ClinicalImageRecord, CodeItem, ContextItem, SequenceRole,
    PRIVATE_VIEW_CID,
};

const ACQUISITION_CONTEXT_PREFIX: &str = "AcquisitionContext";
const FALLBACK_ORIENTATION: &str = "OrientationFront";

/// What an injection pass could not resolve
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionReport {
    pub view_found: bool,
    pub unresolved: Vec<String>,
}

impl InjectionReport {
    pub fn is_complete(&self) -> bool {
        self.view_found && self.unresolved.is_empty()
    }
}

/// Fills coded sequences and view-derived attributes, and manages the
/// private view-type code.
#[derive(Debug, Clone)]
pub struct CodeInjector {
    private_view_cid: String,
    default_creator_uid: String,
}

impl Default for CodeInjector {
    fn default() -> Self {
        Self::new(PRIVATE_VIEW_CID, crate::identity::DEFAULT_UID_ROOT)
    }
}

/// Resolves tokens through the codes table, remembering misses
struct Resolver<'a> {
    codes: &'a dyn CodeSource,
    unresolved: Vec<String>,
}

impl<'a> Resolver<'a> {
    fn code(&mut self, keyword: &str) -> Option<CodeItem> {
        match self.codes.get_code(keyword) {
            Some(entry) => Some(CodeItem::from_entry(entry)),
            None => {
                warn!("Keyword [{}] did not match any code. Skipping.", keyword);
                self.unresolved.push(keyword.to_string());
                None
            }
        }
    }

    fn column(&mut self, view: &ViewDefinition, column: &str) -> Vec<CodeItem> {
        view.tokens(column)
            .into_iter()
            .filter_map(|token| self.code(token))
            .collect()
    }
}

impl CodeInjector {
    pub fn new(private_view_cid: impl Into<String>, default_creator_uid: impl Into<String>) -> Self {
        Self {
            private_view_cid: private_view_cid.into(),
            default_creator_uid: default_creator_uid.into(),
        }
    }

    pub fn private_view_cid(&self) -> &str {
        &self.private_view_cid
    }

    /// Code `record` for `view_keyword`.
    ///
    /// A missing view leaves the record uncoded; unresolved tokens are
    /// skipped. Both are reported and logged, never returned as errors.
    /// A previously set private view code survives re-injection.
    pub fn inject(
        &self,
        record: &mut ClinicalImageRecord,
        view_keyword: &str,
        codes: &dyn CodeSource,
    ) -> InjectionReport {
        let keyword = normalize_view_keyword(view_keyword);
        record.view_keyword = Some(keyword.clone());

        let Some(view) = codes.get_view(&keyword) else {
            warn!(
                "No view definition for keyword [{}]; record left without clinical coding",
                keyword
            );
            return InjectionReport::default();
        };
        debug!("Setting DICOM attributes for {}", keyword);

        let mut resolver = Resolver {
            codes,
            unresolved: Vec::new(),
        };

        self.apply_view_attributes(record, &keyword, view, &mut resolver);

        for role in SequenceRole::ALL {
            let items = resolver.column(view, role.keyword());
            let modifiers = role
                .modifier_keyword()
                .map(|column| resolver.column(view, column))
                .unwrap_or_default();
            let kept: Vec<CodeItem> = record
                .sequence(role)
                .map(|s| {
                    s.items
                        .iter()
                        .filter(|item| item.is_private_marker(&self.private_view_cid))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();

            if items.is_empty() && kept.is_empty() {
                record.coded_sequences.remove(&role);
                continue;
            }
            let sequence = record.sequence_mut(role);
            sequence.items = items;
            sequence.items.extend(kept);
            sequence.modifiers = modifiers;
        }

        record.acquisition_context = acquisition_context(record, view, &mut resolver);

        InjectionReport {
            view_found: true,
            unresolved: resolver.unresolved,
        }
    }

    fn apply_view_attributes(
        &self,
        record: &mut ClinicalImageRecord,
        keyword: &str,
        view: &ViewDefinition,
        resolver: &mut Resolver<'_>,
    ) {
        let comments = format!("{}^{}", keyword, view.get("ImageComments").unwrap_or_default());
        record.view.image_comments = Some(comments.replace('\u{a0}', " "));

        if record.series_description.is_none() {
            record.series_description = view
                .get("SeriesDescription")
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
        }

        let orientation = view
            .get("PatientOrientation")
            .and_then(|k| resolver.codes.get_code(k.trim()))
            .or_else(|| {
                warn!(
                    "PatientOrientation not found for {}. Defaulting to {}",
                    keyword, FALLBACK_ORIENTATION
                );
                resolver.codes.get_code(FALLBACK_ORIENTATION)
            });
        record.view.patient_orientation = orientation
            .map(|entry| entry.code.split('^').map(str::to_string).collect())
            .unwrap_or_default();

        record.view.image_laterality = match view.get("ImageLaterality").map(str::trim) {
            Some(k) if !k.is_empty() && k != "na" => resolver.code(k).map(|c| c.value().to_string()),
            _ => None,
        };
    }
}

/// CODE items from every AcquisitionContext column, then the two progress
/// items when both the event type and the day offset are known
fn acquisition_context(
    record: &ClinicalImageRecord,
    view: &ViewDefinition,
    resolver: &mut Resolver<'_>,
) -> Vec<ContextItem> {
    let mut items = Vec::new();

    for (column, cell) in view.columns() {
        if !column.starts_with(ACQUISITION_CONTEXT_PREFIX) {
            continue;
        }
        let Some((_, concept)) = column.split_once('^') else {
            warn!("Acquisition context column '{}' names no concept", column);
            continue;
        };
        let tokens = split_tokens(cell);
        if tokens.is_empty() {
            continue;
        }
        let Some(concept_name) = resolver.code(concept) else {
            continue;
        };
        for token in tokens {
            if let Some(concept) = resolver.code(token) {
                items.push(ContextItem::Code {
                    concept_name: concept_name.clone(),
                    concept,
                });
            }
        }
    }

    if let (Some(event), Some(days)) = (&record.treatment_event_type, record.days_after_event) {
        if let (Some(concept_name), Some(concept)) =
            (resolver.code("TemporalEventType"), resolver.code(event))
        {
            items.push(ContextItem::Code {
                concept_name,
                concept,
            });
        }
        if let (Some(concept_name), Some(unit)) =
            (resolver.code("OffsetFromEvent"), resolver.code("day"))
        {
            items.push(ContextItem::Numeric {
                concept_name,
                value: days.to_string(),
                unit,
            });
        }
    }

    items
}
