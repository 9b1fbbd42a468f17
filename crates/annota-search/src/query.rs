//! Query translation.
//!
//! Maps parsed request parameters onto a backend-neutral filter set. Pure
//! functions only; each strategy owns its native field names, query syntax,
//! and pagination.

use annota_core::{FieldFilter, FilterField, FilterValue, SearchParams, TranslatedQuery};

/// Translate parsed request parameters into a backend-neutral query.
///
/// Absent parameters contribute no filter. Usage ids always collapse into a
/// single any-of filter, even when only one was given. The text criterion and
/// the highlight flag pass through untouched.
pub fn translate(params: &SearchParams) -> TranslatedQuery {
    let mut filters = Vec::new();

    if let Some(user) = &params.user {
        filters.push(FieldFilter {
            field: FilterField::User,
            value: FilterValue::Term(user.clone()),
        });
    }

    if let Some(course_id) = &params.course_id {
        filters.push(FieldFilter {
            field: FilterField::CourseId,
            value: FilterValue::Term(course_id.clone()),
        });
    }

    if !params.usage_ids.is_empty() {
        filters.push(FieldFilter {
            field: FilterField::UsageId,
            value: FilterValue::AnyOf(params.usage_ids.clone()),
        });
    }

    TranslatedQuery {
        filters,
        text: params.text.clone(),
        highlight: params.highlight,
    }
}
