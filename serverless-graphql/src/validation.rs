//! Validation rules applied on top of schema validation.

use std::collections::HashSet;

use apollo_compiler::ExecutableDocument;
use apollo_compiler::Name;
use apollo_compiler::Node;
use apollo_compiler::ast;
use apollo_compiler::executable;

use crate::graphql::ERROR_CODE_VALIDATION_FAILED;
use crate::graphql::Error;
use crate::graphql::Location;

/// A check run over the parsed document before any execution.
pub trait ValidationRule: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Every violation found in `document`; empty when the document is accepted.
    fn validate(&self, document: &ast::Document) -> Vec<Error>;
}

/// Rejects `__schema` and `__type` fields. `__typename` stays allowed.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoIntrospection;

const INTROSPECTION_FIELDS: [&str; 2] = ["__schema", "__type"];

impl ValidationRule for NoIntrospection {
    fn name(&self) -> &'static str {
        "NoIntrospection"
    }

    fn validate(&self, document: &ast::Document) -> Vec<Error> {
        let mut errors = Vec::new();
        for definition in &document.definitions {
            let selection_set = match definition {
                ast::Definition::OperationDefinition(def) => &def.selection_set,
                ast::Definition::FragmentDefinition(def) => &def.selection_set,
                _ => continue,
            };
            walk_fields(selection_set, &mut |field| {
                if INTROSPECTION_FIELDS.contains(&field.name.as_str()) {
                    errors.push(introspection_disabled(document, field));
                }
            });
        }
        errors
    }
}

fn introspection_disabled(document: &ast::Document, field: &Node<ast::Field>) -> Error {
    let locations = field
        .line_column_range(&document.sources)
        .map(|range| {
            vec![Location {
                line: range.start.line as u32,
                column: range.start.column as u32,
            }]
        })
        .unwrap_or_default();
    Error::builder()
        .message(format!(
            "GraphQL introspection has been disabled, but the requested query contained the field \"{}\".",
            field.name
        ))
        .locations(locations)
        .extension_code(ERROR_CODE_VALIDATION_FAILED)
        .build()
}

fn walk_fields(set: &[ast::Selection], visit: &mut impl FnMut(&Node<ast::Field>)) {
    for selection in set {
        match selection {
            ast::Selection::Field(field) => {
                visit(field);
                walk_fields(&field.selection_set, visit);
            }
            ast::Selection::InlineFragment(fragment) => {
                walk_fields(&fragment.selection_set, visit)
            }
            ast::Selection::FragmentSpread(_) => {}
        }
    }
}

/// Whether `operation` asks for incremental delivery through `@defer` or `@stream`, directly or
/// through the fragments it spreads.
pub(crate) fn requests_incremental_delivery(
    document: &ExecutableDocument,
    operation: &executable::Operation,
) -> bool {
    fn incremental(directives: &executable::DirectiveList) -> bool {
        directives
            .iter()
            .any(|directive| matches!(directive.name.as_str(), "defer" | "stream"))
    }

    fn walk<'a>(
        document: &'a ExecutableDocument,
        set: &'a executable::SelectionSet,
        visited: &mut HashSet<&'a Name>,
    ) -> bool {
        set.selections.iter().any(|selection| match selection {
            executable::Selection::Field(field) => {
                incremental(&field.directives) || walk(document, &field.selection_set, visited)
            }
            executable::Selection::InlineFragment(fragment) => {
                incremental(&fragment.directives)
                    || walk(document, &fragment.selection_set, visited)
            }
            executable::Selection::FragmentSpread(spread) => {
                incremental(&spread.directives)
                    || (visited.insert(&spread.fragment_name)
                        && document
                            .fragments
                            .get(&spread.fragment_name)
                            .is_some_and(|fragment| {
                                walk(document, &fragment.selection_set, visited)
                            }))
            }
        })
    }

    walk(document, &operation.selection_set, &mut HashSet::new())
}
