use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A point placed on a hotspot image, in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A learner's response to one question.
///
/// Every field is optional: the same type doubles as a partial update, and
/// [`Answer::merge`] overlays only the fields a patch carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Answer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Left item id to right item id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Vec<Point>>,
}

impl Answer {
    #[must_use]
    pub fn selections<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selected_options: Some(ids.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            text: Some(value.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn code(value: impl Into<String>) -> Self {
        Self {
            code: Some(value.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn order<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            order: Some(ids.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Shallow merge: each field present in `patch` replaces the stored field.
    ///
    /// Lists and maps are replaced as a whole, never unioned.
    pub fn merge(&mut self, patch: Answer) {
        let Answer {
            selected_options,
            text,
            code,
            matches,
            order,
            coordinates,
        } = patch;

        if selected_options.is_some() {
            self.selected_options = selected_options;
        }
        if text.is_some() {
            self.text = text;
        }
        if code.is_some() {
            self.code = code;
        }
        if matches.is_some() {
            self.matches = matches;
        }
        if order.is_some() {
            self.order = order;
        }
        if coordinates.is_some() {
            self.coordinates = coordinates;
        }
    }

    /// True when no field carries a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected_options.is_none()
            && self.text.is_none()
            && self.code.is_none()
            && self.matches.is_none()
            && self.order.is_none()
            && self.coordinates.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_fields_missing_from_patch() {
        let mut answer = Answer::text("draft");
        answer.merge(Answer::code("fn main() {}"));

        assert_eq!(answer.text.as_deref(), Some("draft"));
        assert_eq!(answer.code.as_deref(), Some("fn main() {}"));
    }

    #[test]
    fn merge_replaces_lists_instead_of_union() {
        let mut answer = Answer::selections(["A"]);
        answer.merge(Answer::selections(["B"]));

        assert_eq!(answer, Answer::selections(["B"]));
    }

    #[test]
    fn serializes_camel_case_without_empty_fields() {
        let json = serde_json::to_value(Answer::selections(["A"])).unwrap();
        assert_eq!(json, serde_json::json!({ "selectedOptions": ["A"] }));

        let parsed: Answer =
            serde_json::from_value(serde_json::json!({ "text": "x", "unknown": 1 })).unwrap();
        assert_eq!(parsed, Answer::text("x"));
    }
}
