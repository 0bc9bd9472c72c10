//! Lookup of the built-in code generation backends.

use crate::traits::{Backend, BackendCategory};

/// All compiled-in backends, in a fixed order.
pub fn backends() -> Vec<&'static dyn Backend> {
    #[allow(unused_mut)]
    let mut backends: Vec<&'static dyn Backend> = Vec::new();

    #[cfg(feature = "backend-typescript")]
    {
        backends.push(&crate::output::typescript::TYPESCRIPT_BACKEND);
    }

    #[cfg(feature = "backend-dart")]
    {
        backends.push(&crate::output::dart::DART_BACKEND);
    }

    #[cfg(feature = "backend-go-json")]
    {
        backends.push(&crate::output::go_json::GO_JSON_BACKEND);
    }

    #[cfg(feature = "backend-go-scan")]
    {
        backends.push(&crate::output::go_scan::GO_SCAN_BACKEND);
    }

    #[cfg(feature = "backend-go-enums")]
    {
        backends.push(&crate::output::go_enums::GO_ENUMS_BACKEND);
    }

    #[cfg(feature = "backend-sql")]
    {
        backends.push(&crate::output::sql::SQL_BACKEND);
    }

    backends
}

/// Get a backend by name.
pub fn get_backend(name: &str) -> Option<&'static dyn Backend> {
    backends().into_iter().find(|b| b.name() == name)
}

/// Get all backends for a language.
pub fn backends_for_language(language: &str) -> Vec<&'static dyn Backend> {
    backends()
        .into_iter()
        .filter(|b| b.language() == language)
        .collect()
}

/// Get all backends in a category.
pub fn backends_by_category(category: BackendCategory) -> Vec<&'static dyn Backend> {
    backends()
        .into_iter()
        .filter(|b| b.category() == category)
        .collect()
}

/// List all backend names.
pub fn backend_names() -> Vec<&'static str> {
    backends().iter().map(|b| b.name()).collect()
}
