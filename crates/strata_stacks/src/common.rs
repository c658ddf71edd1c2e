//! Property fragments shared by both stacks.

use serde_json::{json, Value};
use strata_graph::PropertyValue;

/// Trust policy letting `service` assume a role.
pub(crate) fn assume_role_policy(service: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Action": "sts:AssumeRole",
            "Effect": "Allow",
            "Principal": { "Service": service }
        }]
    })
}

/// Key policy granting the account root full control of a KMS key.
pub(crate) fn account_root_key_policy() -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "AWS": account_root_arn() },
            "Action": "kms:*",
            "Resource": "*"
        }]
    })
}

pub(crate) fn account_root_arn() -> PropertyValue {
    PropertyValue::join(
        "",
        [
            PropertyValue::string("arn:"),
            PropertyValue::partition(),
            PropertyValue::string(":iam::"),
            PropertyValue::account_id(),
            PropertyValue::string(":root"),
        ],
    )
}

pub(crate) fn allow(actions: &[&str], resource: PropertyValue) -> Value {
    json!({
        "Effect": "Allow",
        "Action": actions,
        "Resource": resource
    })
}

pub(crate) fn policy_document(statements: Vec<Value>) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": statements
    })
}

/// `[{Key, Value}]` tag list with a single `Name` tag.
pub(crate) fn name_tag(name: &str) -> Value {
    json!([{ "Key": "Name", "Value": name }])
}
