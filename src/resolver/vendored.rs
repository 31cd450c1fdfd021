//! Resolution of imports into the `vendor` directory.

use crate::core::label::Label;
use crate::core::labeler::Labeler;
use crate::resolver::errors::ResolveError;
use crate::resolver::NonlocalResolver;

/// Maps every non-local import to a library under `vendor/`.
#[derive(Debug)]
pub struct VendoredResolver {
    labeler: Labeler,
}

impl VendoredResolver {
    pub fn new(labeler: Labeler) -> Self {
        VendoredResolver { labeler }
    }
}

impl NonlocalResolver for VendoredResolver {
    fn resolve(&mut self, imp: &str) -> Result<Label, ResolveError> {
        Ok(self.labeler.library_label(&format!("vendor/{}", imp)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::StructureMode;

    #[test]
    fn test_vendored_labels() {
        let mut r = VendoredResolver::new(Labeler::with_mode(StructureMode::Hierarchical, ""));
        assert_eq!(
            r.resolve("github.com/acme/widget").unwrap().to_string(),
            "//vendor/github.com/acme/widget:go_default_library"
        );

        let mut flat = VendoredResolver::new(Labeler::with_mode(StructureMode::Flat, ""));
        assert_eq!(
            flat.resolve("example.com/x").unwrap().to_string(),
            "//:vendor/example.com/x"
        );
    }
}
