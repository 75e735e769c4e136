//! # fastpush construct
//!
//! Synth-side half of fastpush. A [`FunctionDefinition`] validates a Node.js
//! Lambda, and when rendered into a template tags it with the upload info the
//! update flow later reads back:
//!
//! - an `<id>UploadInfoExtended` output, only materialized when the synth
//!   runs with `NODE_ENV=test`
//! - `fastpush:uploadInfo` resource metadata
//!
//! Both record the entry file and the modules left out of the bundle.
//! [`FunctionDefinition::package`] builds the zip the function's `Code`
//! location should hold, with the same bundler settings the update flow uses.
//!
//! [`Registry`] wires functions to each other and to DynamoDB tables.
//!
//! ```rust,ignore
//! use fastpush_construct::{Dependency, FunctionProps, Registry, stack_template};
//!
//! let mut registry = Registry::new();
//! let users = registry.function(
//!     "LIST_USERS",
//!     FunctionProps::new("src/users.ts").depends_on(Dependency::tables(["USERS"])),
//! )?;
//! registry.register_table("USERS", "UsersTable", None);
//!
//! let mut functions = vec![users];
//! registry.initialize(&mut functions)?;
//! let template = stack_template(&functions, "test");
//! ```

mod error;
mod function;
mod naming;
mod registry;

pub use error::{ConstructError, Result};
pub use function::{
    CodeLocation, DEFAULT_HANDLER, DEFAULT_RUNTIME, FunctionDefinition, FunctionProps,
    PolicyStatement,
};
pub use naming::snake_to_pascal;
pub use registry::{
    Dependency, Registry, StartingPosition, StreamOptions, StreamRequest, StreamSource,
};

use serde_json::{Map, Value};

/// Merge the fragments of several functions into one template.
pub fn stack_template(functions: &[FunctionDefinition], node_env: &str) -> Value {
    let mut merged = Map::new();
    for function in functions {
        let Value::Object(fragment) = function.to_template(node_env) else {
            continue;
        };
        for (section, entries) in fragment {
            let Value::Object(entries) = entries else {
                continue;
            };
            let target = merged
                .entry(section)
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(target) = target {
                target.extend(entries);
            }
        }
    }
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fastpush_update::Template;

    #[test]
    fn test_stack_template_merges_sections() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.ts"), "").unwrap();
        std::fs::write(dir.path().join("b.js"), "").unwrap();

        let functions = vec![
            FunctionDefinition::new_in(dir.path(), "A", FunctionProps::new("a.ts")).unwrap(),
            FunctionDefinition::new_in(dir.path(), "B", FunctionProps::new("b.js")).unwrap(),
        ];

        let template: Template =
            serde_json::from_value(stack_template(&functions, "test")).unwrap();
        let names: Vec<_> = template
            .upload_infos()
            .into_iter()
            .map(|(_, info)| info.function_name)
            .collect();
        assert_eq!(names, vec!["A", "B"]);
        assert!(template.resources.contains_key("AServiceRole"));
    }
}
