// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Ownership annotations stamped onto every remote object this operator
//! creates. An object is owned by a RemoteManifest iff all three
//! annotations are present and the UID matches; an object without them is
//! never treated as owned by anyone, so pre-existing objects are not
//! silently adopted.

use kube::api::ObjectMeta;

/// The three annotation keys encoding the owning controller, derived from
/// the manifest group/kind identifier. Built once at startup and passed
/// explicitly wherever ownership is read or written.
#[derive(Debug, Clone)]
pub struct OwnerKeys {
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

impl OwnerKeys {
    pub fn for_group_kind(group_kind: &str) -> Self {
        OwnerKeys {
            namespace: format!("{}/namespace", group_kind),
            name: format!("{}/name", group_kind),
            uid: format!("{}/uid", group_kind),
        }
    }
}

/// Unconditionally overwrite the ownership annotations on `object` with
/// `owner`'s namespace, name and UID.
pub fn set_owner(keys: &OwnerKeys, owner: &ObjectMeta, object: &mut ObjectMeta) {
    let annotations = object.annotations.get_or_insert_with(Default::default);
    annotations.insert(
        keys.namespace.clone(),
        owner.namespace.clone().unwrap_or_default(),
    );
    annotations.insert(keys.name.clone(), owner.name.clone().unwrap_or_default());
    annotations.insert(keys.uid.clone(), owner.uid.clone().unwrap_or_default());
}

fn annotation<'a>(object: &'a ObjectMeta, key: &str) -> &'a str {
    object
        .annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .map(String::as_str)
        .unwrap_or_default()
}

/// True iff all three ownership annotations are set and non-empty
pub fn has_owner(keys: &OwnerKeys, object: &ObjectMeta) -> bool {
    !annotation(object, &keys.namespace).is_empty()
        && !annotation(object, &keys.name).is_empty()
        && !annotation(object, &keys.uid).is_empty()
}

/// True iff `remote` is owned and its owner UID matches `template`'s.
/// Two objects without any owner do not share one.
pub fn same_owner(keys: &OwnerKeys, remote: &ObjectMeta, template: &ObjectMeta) -> bool {
    if !has_owner(keys, remote) {
        return false;
    }

    annotation(remote, &keys.uid) == annotation(template, &keys.uid)
}

/// The owner name recorded on a template, for conflict messages
pub fn owner_name(keys: &OwnerKeys, object: &ObjectMeta) -> String {
    annotation(object, &keys.name).to_string()
}
