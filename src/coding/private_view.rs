use chrono::{Local, NaiveDate};
use tracing::warn;

use super::CodeInjector;
use crate::models::{ClinicalImageRecord, CodeItem, PrivateExtension, SequenceRole};

impl CodeInjector {
    /// Place `code` as the single private view-type item of the ViewCode
    /// sequence, stamped with today's date.
    pub fn set_private_view_code(
        &self,
        record: &mut ClinicalImageRecord,
        code: &CodeItem,
        creator_uid: Option<&str>,
    ) {
        self.set_private_view_code_on(record, code, creator_uid, Local::now().date_naive());
    }

    /// Idempotent: an existing marked item is replaced where it stands,
    /// otherwise the new item is appended. Other items keep their content
    /// and order.
    ///
    /// The creator UID is the explicit argument, else the one already on
    /// `code`, else the library root.
    pub fn set_private_view_code_on(
        &self,
        record: &mut ClinicalImageRecord,
        code: &CodeItem,
        creator_uid: Option<&str>,
        date: NaiveDate,
    ) {
        let creator = match creator_uid
            .map(str::to_string)
            .or_else(|| code.private().and_then(|p| p.creator_uid.clone()))
        {
            Some(uid) => uid,
            None => {
                warn!(
                    "No ContextGroupExtensionCreatorUID for private view code {}; using {}",
                    code.value(),
                    self.default_creator_uid
                );
                self.default_creator_uid.clone()
            }
        };

        let marked = CodeItem::new(code.value(), code.scheme(), code.meaning()).with_private(
            PrivateExtension {
                context_identifier: self.private_view_cid.clone(),
                extension_flag: true,
                creator_uid: Some(creator),
                local_version: Some(date.format("%Y%m%d").to_string()),
            },
        );

        let cid = self.private_view_cid.as_str();
        let items = &mut record.sequence_mut(SequenceRole::ViewCode).items;
        match items.iter().position(|item| item.is_private_marker(cid)) {
            Some(index) => {
                items[index] = marked;
                let mut seen = 0;
                items.retain(|item| {
                    if item.is_private_marker(cid) {
                        seen += 1;
                        seen == 1
                    } else {
                        true
                    }
                });
            }
            None => items.push(marked),
        }
    }

    /// The ViewCode item carrying the private context identifier
    pub fn private_view_code<'r>(&self, record: &'r ClinicalImageRecord) -> Option<&'r CodeItem> {
        let found = record.sequence(SequenceRole::ViewCode).and_then(|s| {
            s.items.iter().find(|item| {
                item.private()
                    .is_some_and(|p| p.context_identifier == self.private_view_cid)
            })
        });
        if found.is_none() {
            warn!("No ViewCodeSequence item with proprietary ContextIdentifier found.");
        }
        found
    }
}
