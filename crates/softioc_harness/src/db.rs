use std::fmt::Write;

/// One database record: a named, typed record plus its field values.
///
/// Fields are kept in insertion order; `build_database` emits them in the
/// order they were added.
#[derive(Debug, Clone)]
pub struct RecordSpec {
    pub name: String,
    pub rtype: String,
    pub fields: Vec<(String, String)>,
}

impl RecordSpec {
    /// Create a record of the given type, e.g. `RecordSpec::new("test:ao", "ao")`.
    pub fn new(name: impl Into<String>, rtype: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rtype: rtype.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field value. The value is rendered with its default string
    /// conversion, so numeric field values can be passed directly.
    pub fn with_field(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((name.into(), value.to_string()));
        self
    }
}

/// Ordered collection of records describing an EPICS database.
#[derive(Debug, Clone, Default)]
pub struct DatabaseSpec {
    /// Records in the order they will be emitted.
    pub records: Vec<RecordSpec>,
}

impl DatabaseSpec {
    /// Append a record to the database.
    pub fn with_record(mut self, record: RecordSpec) -> Self {
        self.records.push(record);
        self
    }
}

/// Render a database description as softIoc database text.
///
/// Each record becomes a block of the form:
///
/// ```text
/// record(ao, "test:ao")
/// {
///     field(DRVH, "5")
/// }
/// ```
///
/// followed by a blank line. An empty spec yields an empty string.
///
/// Field values are not escaped: a value containing a double quote produces
/// malformed database text. The database format's quoting rules belong to
/// EPICS, so this is left to the caller.
pub fn build_database(spec: &DatabaseSpec) -> String {
    let mut out = String::new();
    for record in &spec.records {
        let _ = writeln!(out, "record({}, \"{}\")", record.rtype, record.name);
        out.push_str("{\n");
        for (field_name, field_value) in &record.fields {
            let _ = writeln!(out, "    field({field_name}, \"{field_value}\")");
        }
        out.push_str("}\n\n");
    }
    // Match the newline-joined output shape: no trailing newline after the
    // final blank separator line.
    if out.ends_with('\n') {
        out.pop();
    }
    out
}
