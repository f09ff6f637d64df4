use rbac_controller_k8s_api::{ObjectMeta, OwnerReference, RBACDefinition, Resource};

/// Builds the controller owner reference stamped onto every generated
/// object. Returns `None` when the definition has not been persisted yet
/// (no name or uid): ownership cannot be established for such a definition.
pub(crate) fn owner_reference(def: &RBACDefinition) -> Option<OwnerReference> {
    let name = def.metadata.name.clone()?;
    let uid = def.metadata.uid.clone()?;
    Some(OwnerReference {
        api_version: RBACDefinition::api_version(&()).to_string(),
        kind: RBACDefinition::kind(&()).to_string(),
        name,
        uid,
        controller: Some(true),
        block_owner_deletion: Some(true),
    })
}

/// True iff the object's owner references are exactly the one-element set
/// produced by [`owner_reference`]. Deep equality, not containment: an
/// object that shares ownership with another controller is not ours to
/// delete.
pub(crate) fn is_owned_by(meta: &ObjectMeta, owner: &OwnerReference) -> bool {
    matches!(meta.owner_references.as_deref(), Some([r]) if r == owner)
}
