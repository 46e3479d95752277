//! Builder configuration

/// Data node the name table is fed through
///
/// The angle brackets keep it out of reach of any cell, range or name id.
pub const NAME_REFERENCES: &str = "<references>";

/// Settings for a [`GraphBuilder`](crate::GraphBuilder)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderSettings {
    /// Id of the data node carrying the name table
    pub names_input: String,
    /// Pattern for function node ids when the seed is taken (`{seed}`, `{n}`)
    ///
    /// A pattern without `{n}` gets the counter appended.
    pub function_pattern: String,
    /// Pattern for the alias of a repeated subexpression (`{seed}`, `{n}`)
    pub alias_pattern: String,
    /// Collapse the result to its canonical shape (1x1 arrays become scalars)
    pub normalize_result: bool,
}

impl Default for BuilderSettings {
    fn default() -> Self {
        Self {
            names_input: NAME_REFERENCES.to_string(),
            function_pattern: "{seed}<{n}>".to_string(),
            alias_pattern: "c{n}>{seed}".to_string(),
            normalize_result: true,
        }
    }
}
