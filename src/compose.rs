//! Building the schema that a discriminator registration actually stores.
//!
//! A registered child has to accept everything its base accepts, plus the tag. Two paths lead
//! there:
//!
//! - [`derive`]: a fresh schema starting from a copy of the base's fields, then the child's own
//!   fields, then the tag field.
//! - [`merge_into`]: the same composition applied to the child in place. Used when the child is
//!   the base itself or the schema that embeds the base, so the registration stores the child's
//!   own id and the graph keeps a single cycle instead of growing copies.
//!
//! In both cases the primary key follows the base: an explicitly typed `_id` is inherited
//! exactly, an auto-generated one stays auto-generated, and a base without `_id` produces a
//! schema without one. Discriminator maps are never copied.

use crate::field::FieldDescriptor;
use crate::schema::Schema;
use crate::ID_PATH;

/// The primary key a schema composed from `base` should carry.
fn inherited_id(base: &Schema) -> Option<FieldDescriptor> {
    match base.id_field() {
        Some(id) if !id.is_auto() => Some(id.clone()),
        Some(_) => Some(FieldDescriptor::auto_id()),
        None => None,
    }
}

fn tag_field() -> FieldDescriptor {
    FieldDescriptor::scalar("String")
}

/// Copy `base` into a new schema with the tag field added. The copy shares embedded schema ids
/// with the base and starts out without discriminators.
pub(crate) fn compose(base: &Schema, tag: &str) -> Schema {
    let mut derived = Schema::with_options(format!("{}:{}", base.name(), tag), base.options().clone());
    match inherited_id(base) {
        Some(id) => derived.define_path_first(ID_PATH, id),
        None => {
            derived.remove_path(ID_PATH);
        }
    }
    for (name, descriptor) in base.fields() {
        if name != ID_PATH {
            derived.define_path(name, descriptor.clone());
        }
    }
    let key = base.discriminator_key().to_string();
    if !derived.has_path(&key) {
        derived.define_path(key, tag_field());
    }
    derived
}

/// Compose `base` with the extra fields of `child`. Fields declared by both keep the base's
/// descriptor.
pub(crate) fn derive(base: &Schema, child: &Schema, tag: &str) -> Schema {
    let mut derived = compose(base, tag);
    for (name, descriptor) in child.fields() {
        if name != ID_PATH && !derived.has_path(name) {
            derived.define_path(name, descriptor.clone());
        }
    }
    derived
}

/// Apply the composition of `base` onto `child` without making a new schema. The child keeps its
/// own fields, order, options, and discriminators, gains whatever base fields it lacks plus the
/// tag field, and takes the base's primary key.
pub(crate) fn merge_into(base: &Schema, child: &mut Schema) {
    match inherited_id(base) {
        Some(id) => child.define_path_first(ID_PATH, id),
        None => {
            child.remove_path(ID_PATH);
        }
    }
    for (name, descriptor) in base.fields() {
        if name != ID_PATH && !child.has_path(name) {
            child.define_path(name, descriptor.clone());
        }
    }
    let key = base.discriminator_key();
    if !child.has_path(key) {
        child.define_path(key, tag_field());
    }
}
