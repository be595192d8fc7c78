// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: canonical bytes, stamp regions, and object serialization.

pub mod canonical;
pub mod serialize;
pub mod stamp;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

use lopdf::{Dictionary, Document, Object};

pub use canonical::{StampRegion, canonical_slice, canonicalize, locate_stamp_region};
pub use stamp::stamp;

/// Page tree depth beyond which inheritance lookups give up.
const MAX_TREE_DEPTH: usize = 32;

/// Follow a single indirect reference; direct objects are returned as is.
pub(crate) fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        direct => Some(direct),
    }
}

/// Look up a page attribute, walking up `/Parent` for inheritable keys such
/// as `/MediaBox` and `/Resources`.
pub(crate) fn inherited<'a>(
    document: &'a Document,
    page: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    let mut node = page;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return resolve(document, value);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = document.get_dictionary(parent).ok()?;
    }
    None
}

/// Integer or real as `f64`.
pub(crate) fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}
