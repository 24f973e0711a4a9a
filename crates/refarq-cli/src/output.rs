//! Result rendering

use crate::config::OutputFormat;
use refarq_core::{Result, Table, Term};
use serde_json::{Map, Value, json};

/// Render a result table in the requested format
pub fn render(table: &Table, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(table.to_string()),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&results_json(table))?),
    }
}

/// SPARQL 1.1 query results JSON document for `table`
pub fn results_json(table: &Table) -> Value {
    let vars: Vec<&str> = table.vars().iter().map(|v| v.name()).collect();
    let bindings: Vec<Value> = table
        .iter()
        .map(|row| {
            let mut object = Map::new();
            for (var, term) in row.iter() {
                object.insert(var.name().to_string(), term_json(term));
            }
            Value::Object(object)
        })
        .collect();
    json!({
        "head": { "vars": vars },
        "results": { "bindings": bindings },
    })
}

fn term_json(term: &Term) -> Value {
    match term {
        Term::Iri(iri) => json!({ "type": "uri", "value": iri.as_str() }),
        Term::BlankNode(label) => json!({ "type": "bnode", "value": label }),
        Term::Literal(lit) => {
            let mut object = Map::new();
            object.insert("type".into(), Value::from("literal"));
            object.insert("value".into(), Value::from(lit.lexical.as_str()));
            if let Some(lang) = &lit.language {
                object.insert("xml:lang".into(), Value::from(lang.as_str()));
            } else if let Some(datatype) = &lit.datatype {
                object.insert("datatype".into(), Value::from(datatype.as_str()));
            }
            Value::Object(object)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refarq_core::{Binding, Var, xsd};

    #[test]
    fn test_results_json() {
        let table = Table::from_rows(vec![
            Binding::from_iter([
                (Var::new("s"), Term::iri("http://ex/a")),
                (Var::new("n"), Term::integer(4)),
            ]),
            Binding::single(Var::new("s"), Term::lang_string("chat", "fr")),
        ]);
        let doc = results_json(&table);
        assert_eq!(doc["head"]["vars"], json!(["n", "s"]));

        let rows = doc["results"]["bindings"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["s"], json!({"type": "uri", "value": "http://ex/a"}));
        assert_eq!(rows[0]["n"]["datatype"], json!(xsd::INTEGER));
        assert_eq!(rows[1]["s"]["xml:lang"], json!("fr"));
        assert!(rows[1].get("n").is_none());
    }

    #[test]
    fn test_render_text() {
        let table = Table::single(Var::new("x"), Term::string("hi"));
        let text = render(&table, OutputFormat::Text).unwrap();
        assert!(text.contains("?x"));
        assert!(text.contains("\"hi\""));
    }
}
