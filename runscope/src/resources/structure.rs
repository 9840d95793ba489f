//! Conversions between configuration values and Runscope API types
//!
//! `expand_*` turns block items from a config or plan into request types,
//! `flatten_*` turns API types back into state values. Set-typed blocks are
//! flattened in sorted order so repeated reads produce identical state.
//! Empty optional attributes flatten to null and empty blocks to an empty list,
//! mirroring what an omitted argument looks like in a config.

use crate::api::environment::{Emails, Recipient, RemoteAgent};
use crate::api::step::{Assertion, StepAuth, Variable};
use std::collections::{BTreeMap, HashMap};
use tfplug::types::{Dynamic, DynamicValue};

pub const STEP_SOURCES: &[&str] = &[
    "response_status",
    "response_headers",
    "response_json",
    "response_xml",
    "response_text",
    "response_time",
    "response_size",
];

pub const STEP_COMPARISONS: &[&str] = &[
    "equal",
    "not_equal",
    "empty",
    "not_empty",
    "contains",
    "does_not_contain",
    "is_a_number",
    "equal_number",
    "is_less_than",
    "is_less_than_or_equal",
    "is_greater_than",
    "is_greater_than_or_equal",
    "has_key",
    "has_value",
    "is_null",
];

pub const EMAIL_NOTIFY_ON: &[&str] = &["all", "failures", "threshold", "switch"];

// Accessors over config values. Null, unknown and missing all read as empty.

pub fn get_string(config: &DynamicValue, name: &str) -> String {
    item_string(&config.value, name)
}

pub fn get_bool(config: &DynamicValue, name: &str) -> bool {
    item_bool(&config.value, name)
}

/// Items of a nested block, or elements of a list/set attribute
pub fn get_items(config: &DynamicValue, name: &str) -> Vec<Dynamic> {
    item_list(&config.value, name).to_vec()
}

pub fn item_string(item: &Dynamic, name: &str) -> String {
    item.get(name)
        .and_then(Dynamic::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

pub fn item_bool(item: &Dynamic, name: &str) -> bool {
    item.get(name).and_then(Dynamic::as_bool).unwrap_or(false)
}

pub fn item_i64(item: &Dynamic, name: &str) -> i64 {
    item.get(name)
        .and_then(Dynamic::as_number)
        .map(|n| n as i64)
        .unwrap_or(0)
}

pub fn item_list<'a>(item: &'a Dynamic, name: &str) -> &'a [Dynamic] {
    item.get(name).and_then(Dynamic::as_list).unwrap_or(&[])
}

pub fn expand_string_list(items: &[Dynamic]) -> Vec<String> {
    items
        .iter()
        .filter_map(Dynamic::as_str)
        .map(str::to_string)
        .collect()
}

pub fn expand_string_map(value: Option<&Dynamic>) -> BTreeMap<String, String> {
    value
        .and_then(Dynamic::as_map)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

pub fn flatten_string(value: &str) -> Dynamic {
    if value.is_empty() {
        Dynamic::Null
    } else {
        Dynamic::from(value)
    }
}

pub fn flatten_string_list(values: &[String]) -> Dynamic {
    if values.is_empty() {
        Dynamic::Null
    } else {
        Dynamic::from(values.to_vec())
    }
}

/// Sets of strings are sorted
pub fn flatten_string_set(values: &[String]) -> Dynamic {
    let mut sorted = values.to_vec();
    sorted.sort();
    flatten_string_list(&sorted)
}

pub fn flatten_string_map(values: &BTreeMap<String, String>) -> Dynamic {
    if values.is_empty() {
        return Dynamic::Null;
    }
    Dynamic::Map(
        values
            .iter()
            .map(|(k, v)| (k.clone(), Dynamic::from(v.as_str())))
            .collect::<HashMap<_, _>>(),
    )
}

fn sorted_by_key<T, K: Ord>(items: &[T], key: impl Fn(&T) -> K) -> Vec<&T> {
    let mut refs: Vec<&T> = items.iter().collect();
    refs.sort_by_key(|item| key(*item));
    refs
}

pub fn expand_step_variables(items: &[Dynamic]) -> Vec<Variable> {
    items
        .iter()
        .map(|item| Variable {
            name: item_string(item, "name"),
            property: item_string(item, "property"),
            source: item_string(item, "source"),
        })
        .collect()
}

pub fn flatten_step_variables(variables: &[Variable]) -> Dynamic {
    let items = sorted_by_key(variables, |v| (v.name.clone(), v.source.clone(), v.property.clone()))
        .into_iter()
        .map(|v| {
            Dynamic::object([
                ("name", Dynamic::from(v.name.as_str())),
                ("property", flatten_string(&v.property)),
                ("source", Dynamic::from(v.source.as_str())),
            ])
        })
        .collect::<Vec<_>>();
    Dynamic::List(items)
}

pub fn expand_step_assertions(items: &[Dynamic]) -> Vec<Assertion> {
    items
        .iter()
        .map(|item| Assertion {
            source: item_string(item, "source"),
            property: item_string(item, "property"),
            comparison: item_string(item, "comparison"),
            value: item_string(item, "value"),
        })
        .collect()
}

/// Assertions are ordered; no sorting
pub fn flatten_step_assertions(assertions: &[Assertion]) -> Dynamic {
    Dynamic::List(
        assertions
            .iter()
            .map(|a| {
                Dynamic::object([
                    ("source", Dynamic::from(a.source.as_str())),
                    ("property", flatten_string(&a.property)),
                    ("comparison", Dynamic::from(a.comparison.as_str())),
                    ("value", flatten_string(&a.value)),
                ])
            })
            .collect(),
    )
}

/// `header { header = "Accept" value = "..." }` blocks grouped by header name
pub fn expand_step_headers(items: &[Dynamic]) -> BTreeMap<String, Vec<String>> {
    expand_multi_map(items, "header")
}

pub fn flatten_step_headers(headers: &BTreeMap<String, Vec<String>>) -> Dynamic {
    flatten_multi_map(headers, "header")
}

/// `form_parameter { name = "..." value = "..." }` blocks grouped by name
pub fn expand_step_form(items: &[Dynamic]) -> BTreeMap<String, Vec<String>> {
    expand_multi_map(items, "name")
}

pub fn flatten_form_parameters(form: &BTreeMap<String, Vec<String>>) -> Dynamic {
    flatten_multi_map(form, "name")
}

fn expand_multi_map(items: &[Dynamic], key_attr: &str) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for item in items {
        map.entry(item_string(item, key_attr))
            .or_default()
            .push(item_string(item, "value"));
    }
    map
}

fn flatten_multi_map(map: &BTreeMap<String, Vec<String>>, key_attr: &str) -> Dynamic {
    let mut pairs: Vec<(&String, &String)> = map
        .iter()
        .flat_map(|(k, values)| values.iter().map(move |v| (k, v)))
        .collect();
    pairs.sort();
    Dynamic::List(
        pairs
            .into_iter()
            .map(|(k, v)| {
                Dynamic::object([
                    (key_attr, Dynamic::from(k.as_str())),
                    ("value", Dynamic::from(v.as_str())),
                ])
            })
            .collect(),
    )
}

/// The auth block holds at most one item
pub fn expand_step_auth(items: &[Dynamic]) -> StepAuth {
    items
        .first()
        .map(|item| StepAuth {
            username: item_string(item, "username"),
            auth_type: item_string(item, "auth_type"),
            password: item_string(item, "password"),
        })
        .unwrap_or_default()
}

pub fn flatten_step_auth(auth: &StepAuth) -> Dynamic {
    if auth.is_empty() {
        return Dynamic::List(vec![]);
    }
    Dynamic::List(vec![Dynamic::object([
        ("username", Dynamic::from(auth.username.as_str())),
        ("auth_type", Dynamic::from(auth.auth_type.as_str())),
        ("password", Dynamic::from(auth.password.as_str())),
    ])])
}

pub fn expand_remote_agents(items: &[Dynamic]) -> Vec<RemoteAgent> {
    items
        .iter()
        .map(|item| RemoteAgent {
            name: item_string(item, "name"),
            uuid: item_string(item, "uuid"),
        })
        .collect()
}

pub fn flatten_remote_agents(agents: &[RemoteAgent]) -> Dynamic {
    let mut sorted = agents.to_vec();
    sorted.sort();
    Dynamic::List(
        sorted
            .iter()
            .map(|a| {
                Dynamic::object([
                    ("name", Dynamic::from(a.name.as_str())),
                    ("uuid", Dynamic::from(a.uuid.as_str())),
                ])
            })
            .collect(),
    )
}

/// The email block holds at most one item; no block means default emails
pub fn expand_emails(items: &[Dynamic]) -> Emails {
    let Some(item) = items.first() else {
        return Emails::default();
    };
    Emails {
        notify_all: item_bool(item, "notify_all"),
        notify_on: item_string(item, "notify_on"),
        notify_threshold: item_i64(item, "notify_threshold"),
        recipients: item_list(item, "recipient")
            .iter()
            .map(|r| Recipient {
                id: item_string(r, "id"),
                name: item_string(r, "name"),
                email: item_string(r, "email"),
            })
            .collect(),
    }
}

/// Only non-default emails produce an email block
pub fn flatten_emails(emails: &Emails) -> Dynamic {
    if emails.is_default() {
        return Dynamic::List(vec![]);
    }

    let mut recipients = emails.recipients.clone();
    recipients.sort();
    let recipients = recipients
        .iter()
        .map(|r| {
            Dynamic::object([
                ("id", flatten_string(&r.id)),
                ("name", flatten_string(&r.name)),
                ("email", flatten_string(&r.email)),
            ])
        })
        .collect::<Vec<_>>();

    let threshold = if emails.notify_threshold == 0 {
        Dynamic::Null
    } else {
        Dynamic::from(emails.notify_threshold)
    };

    Dynamic::List(vec![Dynamic::object([
        ("notify_all", Dynamic::from(emails.notify_all)),
        ("notify_on", flatten_string(&emails.notify_on)),
        ("notify_threshold", threshold),
        ("recipient", Dynamic::List(recipients)),
    ])])
}
