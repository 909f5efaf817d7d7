/// A parsed query document: `{ root_a { ... } alias: root_b(...) { ... } }`
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub selections: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Field(FieldSelection),
    InlineFragment(InlineFragment),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSelection {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: Vec<Argument>,
    /// `None` for leaf fields
    pub selections: Option<Vec<Selection>>,
}

impl FieldSelection {
    /// Key of this field in the result object
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn argument(&self, name: &str) -> Option<&ArgumentValue> {
        self.arguments
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.value)
    }
}

/// `... on Type { ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct InlineFragment {
    pub type_condition: String,
    pub selections: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub value: ArgumentValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentValue {
    String(String),
    Int(i64),
    Variable(String),
}
