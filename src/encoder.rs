//! This module provides the serialization adapter between JSON wire records and `Automaton`.
//!
//! A record is a JSON object with a `kind` field (`dfa`, `nfa` or `tm`) and kind-specific
//! fields. Symbols are one-character strings; an empty string keys an epsilon move.
//!
//! [`encode`] writes the canonical form of a record:
//!
//! * every list is sorted;
//! * only states with at least one move get a transition row, and empty target sets are left
//!   out, so an omitted row and an empty row decode to the same automaton;
//! * `allow_partial` is always written for a `dfa`, and `blank_symbol` always for a `tm`.
//!
//! A record in canonical form survives `encode(decode(record))` unchanged up to list order.

use crate::automaton::{
    Automaton, DeterministicTable, NondeterministicTable, TapeTable, Transitions,
};
use crate::types::{
    AutomatonError, Direction, Kind, Label, State, Symbol, TapeAction, DEFAULT_BLANK_SYMBOL,
    EPSILON_WIRE,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Fields every record must carry, whatever its kind.
const REQUIRED_FIELDS: [&str; 5] = [
    "states",
    "input_symbols",
    "transitions",
    "initial_state",
    "final_states",
];

/// The typed shape of a record once its kind is known. `T` is the transition target shape.
#[derive(Debug, Serialize, Deserialize)]
struct Record<T> {
    states: Vec<State>,
    input_symbols: Vec<String>,
    transitions: BTreeMap<State, BTreeMap<String, T>>,
    initial_state: State,
    final_states: Vec<State>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    allow_partial: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tape_symbols: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    blank_symbol: Option<String>,
}

/// The `[next_state, write_symbol, direction]` triple of a tape machine transition.
#[derive(Debug, Serialize, Deserialize)]
struct TapeRow(State, String, Direction);

/// Decodes a JSON record into a validated `Automaton`.
///
/// # Returns
///
/// * `Ok(Automaton)` if the record is well formed and describes a valid automaton.
/// * `Err(AutomatonError::MissingField)` if `kind` or a field required by the kind is absent.
/// * `Err(AutomatonError::UnknownKind)` if `kind` is not one of `dfa`, `nfa` or `tm`.
/// * `Err(AutomatonError::MalformedRecord)` if a field has the wrong type or shape.
/// * `Err(AutomatonError::Structural)` if the described automaton violates a model invariant.
pub fn decode(record: &Value) -> Result<Automaton, AutomatonError> {
    let object = record
        .as_object()
        .ok_or_else(|| malformed("record must be a JSON object"))?;

    let kind = match object.get("kind") {
        None => return Err(AutomatonError::MissingField("kind".to_string())),
        Some(Value::String(kind)) => kind.parse::<Kind>()?,
        Some(other) => return Err(AutomatonError::UnknownKind(other.to_string())),
    };

    check_required(object, &REQUIRED_FIELDS)?;
    if kind == Kind::Tm {
        check_required(object, &["tape_symbols"])?;
    }

    let automaton = match kind {
        Kind::Dfa => decode_dfa(parse_record(record)?)?,
        Kind::Nfa => decode_nfa(parse_record(record)?)?,
        Kind::Tm => decode_tm(parse_record(record)?)?,
    };

    debug!(
        kind = %kind,
        states = automaton.states().len(),
        "decoded automaton"
    );
    Ok(automaton)
}

/// Parses a JSON document and decodes it with [`decode`].
pub fn from_json(content: &str) -> Result<Automaton, AutomatonError> {
    let record: Value = serde_json::from_str(content)
        .map_err(|e| malformed(&format!("invalid JSON: {e}")))?;
    decode(&record)
}

/// Reads the optional execution input of a record: `input_string` for finite automata, `tape`
/// for tape machines. Either field is accepted for any kind; a missing input is empty.
pub fn decode_input(record: &Value) -> Result<String, AutomatonError> {
    let input = record.get("input_string").or_else(|| record.get("tape"));

    match input {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(input)) => Ok(input.clone()),
        Some(other) => Err(malformed(&format!("input must be a string, got {other}"))),
    }
}

/// Encodes an `Automaton` into a JSON record that [`decode`] turns back into an equal automaton.
///
/// The result is in the canonical form described in the module documentation.
pub fn encode(automaton: &Automaton) -> Value {
    let mut value = match automaton.transitions() {
        Transitions::Deterministic {
            table,
            allow_partial,
        } => {
            let mut record = base_record(automaton, table, |target| target.clone());
            record.allow_partial = Some(*allow_partial);
            to_value(record)
        }
        Transitions::Nondeterministic(table) => {
            let rows = table
                .iter()
                .map(|(state, row)| {
                    let row = row
                        .iter()
                        .map(|(label, targets)| {
                            (label_key(*label), targets.iter().cloned().collect())
                        })
                        .collect::<BTreeMap<String, Vec<State>>>();
                    (state.clone(), row)
                })
                .collect::<BTreeMap<_, _>>();
            let mut record: Record<Vec<State>> = empty_record(automaton);
            record.transitions = rows;
            to_value(record)
        }
        Transitions::TapeMachine {
            table,
            tape_symbols,
            blank,
        } => {
            let mut record = base_record(automaton, table, |action| {
                TapeRow(
                    action.next_state.clone(),
                    action.write.to_string(),
                    action.direction,
                )
            });
            record.tape_symbols = Some(symbol_list(tape_symbols));
            record.blank_symbol = Some(blank.to_string());
            to_value(record)
        }
    };

    if let Value::Object(object) = &mut value {
        object.insert(
            "kind".to_string(),
            Value::String(automaton.kind().to_string()),
        );
    }
    value
}

/// Encodes an `Automaton` together with an execution input. The input is stored under the field
/// [`decode_input`] prefers for the automaton's kind.
pub fn encode_with_input(automaton: &Automaton, input: &str) -> Value {
    let mut value = encode(automaton);
    let field = match automaton.kind() {
        Kind::Tm => "tape",
        Kind::Dfa | Kind::Nfa => "input_string",
    };
    if let Value::Object(object) = &mut value {
        object.insert(field.to_string(), Value::String(input.to_string()));
    }
    value
}

/// Serializes an `Automaton` as a pretty-printed JSON record.
pub fn to_json(automaton: &Automaton) -> String {
    // Serializing a `Value` cannot fail.
    serde_json::to_string_pretty(&encode(automaton)).unwrap_or_default()
}

fn malformed(message: &str) -> AutomatonError {
    AutomatonError::MalformedRecord(message.to_string())
}

fn check_required(object: &Map<String, Value>, fields: &[&str]) -> Result<(), AutomatonError> {
    fields
        .iter()
        .find(|field| !object.contains_key(**field))
        .map_or(Ok(()), |field| {
            Err(AutomatonError::MissingField(field.to_string()))
        })
}

fn parse_record<T: DeserializeOwned>(record: &Value) -> Result<Record<T>, AutomatonError> {
    Record::<T>::deserialize(record).map_err(|e| malformed(&e.to_string()))
}

/// Converts a wire symbol into a `Symbol`. Symbols must be exactly one character long.
fn parse_symbol(symbol: &str) -> Result<Symbol, AutomatonError> {
    let mut chars = symbol.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(malformed(&format!(
            "symbol '{symbol}' must be a single character"
        ))),
    }
}

fn parse_label(symbol: &str) -> Result<Label, AutomatonError> {
    if symbol == EPSILON_WIRE {
        return Ok(Label::Epsilon);
    }
    parse_symbol(symbol).map(Label::Symbol)
}

fn parse_symbols(symbols: &[String]) -> Result<BTreeSet<Symbol>, AutomatonError> {
    symbols.iter().map(|symbol| parse_symbol(symbol)).collect()
}

fn label_key(label: Label) -> String {
    match label {
        Label::Symbol(symbol) => symbol.to_string(),
        Label::Epsilon => EPSILON_WIRE.to_string(),
    }
}

fn symbol_list(symbols: &BTreeSet<Symbol>) -> Vec<String> {
    symbols.iter().map(|symbol| symbol.to_string()).collect()
}

fn decode_dfa(record: Record<State>) -> Result<Automaton, AutomatonError> {
    let mut table = DeterministicTable::new();
    for (state, row) in &record.transitions {
        let mut moves = BTreeMap::new();
        for (symbol, target) in row {
            moves.insert(parse_symbol(symbol)?, target.clone());
        }
        table.insert(state.clone(), moves);
    }

    let transitions = Transitions::Deterministic {
        table,
        allow_partial: record.allow_partial.unwrap_or(false),
    };
    build(record, transitions)
}

fn decode_nfa(record: Record<Vec<State>>) -> Result<Automaton, AutomatonError> {
    let mut table = NondeterministicTable::new();
    for (state, row) in &record.transitions {
        let mut moves = BTreeMap::new();
        for (symbol, targets) in row {
            moves.insert(parse_label(symbol)?, targets.iter().cloned().collect());
        }
        table.insert(state.clone(), moves);
    }

    build(record, Transitions::Nondeterministic(table))
}

fn decode_tm(record: Record<TapeRow>) -> Result<Automaton, AutomatonError> {
    let mut table = TapeTable::new();
    for (state, row) in &record.transitions {
        let mut moves = BTreeMap::new();
        for (symbol, TapeRow(next_state, write, direction)) in row {
            let action = TapeAction::new(next_state.clone(), parse_symbol(write)?, *direction);
            moves.insert(parse_symbol(symbol)?, action);
        }
        table.insert(state.clone(), moves);
    }

    let tape_symbols = parse_symbols(record.tape_symbols.as_deref().unwrap_or_default())?;
    let blank = match &record.blank_symbol {
        Some(blank) => parse_symbol(blank)?,
        None => DEFAULT_BLANK_SYMBOL,
    };

    let transitions = Transitions::TapeMachine {
        table,
        tape_symbols,
        blank,
    };
    build(record, transitions)
}

fn build<T>(record: Record<T>, transitions: Transitions) -> Result<Automaton, AutomatonError> {
    Automaton::new(
        record.states.into_iter().collect(),
        parse_symbols(&record.input_symbols)?,
        transitions,
        record.initial_state,
        record.final_states.into_iter().collect(),
    )
}

/// Builds a record with every field but the transitions filled in.
fn empty_record<T>(automaton: &Automaton) -> Record<T> {
    Record {
        states: automaton.states().iter().cloned().collect(),
        input_symbols: symbol_list(automaton.input_symbols()),
        transitions: BTreeMap::new(),
        initial_state: automaton.initial_state().to_string(),
        final_states: automaton.final_states().iter().cloned().collect(),
        allow_partial: None,
        tape_symbols: None,
        blank_symbol: None,
    }
}

/// Builds a record from a table keyed by plain symbols, converting each target with `row`.
fn base_record<S, T>(
    automaton: &Automaton,
    table: &BTreeMap<State, BTreeMap<Symbol, S>>,
    row: impl Fn(&S) -> T,
) -> Record<T> {
    let mut record = empty_record(automaton);
    for (state, targets) in table {
        let targets = targets
            .iter()
            .map(|(symbol, target)| (symbol.to_string(), row(target)))
            .collect();
        record.transitions.insert(state.clone(), targets);
    }
    record
}

fn to_value<T: Serialize>(record: Record<T>) -> Value {
    // Records only contain strings, lists, maps and booleans, which always serialize.
    serde_json::to_value(record).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Violation;
    use serde_json::json;

    fn dfa_record() -> Value {
        json!({
            "kind": "dfa",
            "states": ["q0", "q1"],
            "input_symbols": ["0", "1"],
            "transitions": {
                "q0": {"0": "q0", "1": "q1"},
                "q1": {"0": "q1", "1": "q0"}
            },
            "initial_state": "q0",
            "final_states": ["q1"],
            "allow_partial": false
        })
    }

    fn nfa_record() -> Value {
        json!({
            "kind": "nfa",
            "states": ["q0", "q1", "q2"],
            "input_symbols": ["a", "b"],
            "transitions": {
                "q0": {"": ["q1"], "a": ["q0", "q1"]},
                "q1": {"b": ["q2"]}
            },
            "initial_state": "q0",
            "final_states": ["q2"]
        })
    }

    fn tm_record() -> Value {
        json!({
            "kind": "tm",
            "states": ["q0", "q1"],
            "input_symbols": ["0", "1"],
            "tape_symbols": ["0", "1", "x"],
            "blank_symbol": "#",
            "transitions": {
                "q0": {"0": ["q0", "x", "R"], "#": ["q1", "#", "L"]}
            },
            "initial_state": "q0",
            "final_states": ["q1"]
        })
    }

    /// Compares two records, treating every list as a set.
    fn assert_same_record(left: &Value, right: &Value) {
        fn normalize(value: &Value) -> Value {
            match value {
                Value::Array(items) => {
                    let mut items: Vec<Value> = items.iter().map(normalize).collect();
                    items.sort_by_key(|item| item.to_string());
                    Value::Array(items)
                }
                Value::Object(object) => Value::Object(
                    object
                        .iter()
                        .map(|(key, value)| (key.clone(), normalize(value)))
                        .collect(),
                ),
                other => other.clone(),
            }
        }
        assert_eq!(normalize(left), normalize(right));
    }

    #[test]
    fn test_decode_dfa() {
        let dfa = decode(&dfa_record()).unwrap();

        assert_eq!(dfa.kind(), Kind::Dfa);
        assert_eq!(dfa.initial_state(), "q0");
        assert_eq!(dfa.transition("q1", '1'), Some(&"q0".to_string()));
        assert!(!dfa.allow_partial());
    }

    #[test]
    fn test_round_trip() {
        for record in [dfa_record(), nfa_record(), tm_record()] {
            let encoded = encode(&decode(&record).unwrap());
            assert_same_record(&encoded, &record);
        }
    }

    #[test]
    fn test_round_trip_partial_dfa() {
        let record = json!({
            "kind": "dfa",
            "states": ["a", "b"],
            "input_symbols": ["x"],
            "transitions": {"a": {"x": "b"}},
            "initial_state": "a",
            "final_states": [],
            "allow_partial": true
        });

        let encoded = encode(&decode(&record).unwrap());
        assert_same_record(&encoded, &record);
    }

    #[test]
    fn test_omitted_and_empty_rows_are_equivalent() {
        let omitted = json!({
            "kind": "dfa",
            "states": ["a", "b"],
            "input_symbols": ["x"],
            "transitions": {"a": {"x": "b"}},
            "initial_state": "a",
            "final_states": ["b"],
            "allow_partial": true
        });
        let mut explicit = omitted.clone();
        explicit["transitions"]["b"] = json!({});

        let automaton = decode(&omitted).unwrap();
        assert_eq!(decode(&explicit).unwrap(), automaton);

        let encoded = encode(&automaton);
        assert!(encoded["transitions"].get("b").is_none());
        assert_same_record(&encoded, &omitted);

        let mut record = nfa_record();
        record["transitions"]["q2"] = json!({"a": []});
        assert_same_record(&encode(&decode(&record).unwrap()), &nfa_record());
    }

    #[test]
    fn test_explicit_defaults_are_kept() {
        let mut record = dfa_record();
        record["allow_partial"] = json!(false);
        let encoded = encode(&decode(&record).unwrap());
        assert_eq!(encoded["allow_partial"], json!(false));
        assert_same_record(&encoded, &record);

        let mut record = tm_record();
        record["blank_symbol"] = json!("_");
        record["transitions"]["q0"] = json!({"0": ["q0", "x", "R"], "_": ["q1", "_", "L"]});
        let encoded = encode(&decode(&record).unwrap());
        assert_eq!(encoded["blank_symbol"], json!("_"));
        assert_same_record(&encoded, &record);
    }

    #[test]
    fn test_omitted_defaults_are_filled_in() {
        let mut record = dfa_record();
        record.as_object_mut().unwrap().remove("allow_partial");

        let dfa = decode(&record).unwrap();
        assert_eq!(dfa, decode(&dfa_record()).unwrap());
        assert_same_record(&encode(&dfa), &dfa_record());
    }

    #[test]
    fn test_missing_kind() {
        let mut record = dfa_record();
        record.as_object_mut().unwrap().remove("kind");

        assert_eq!(
            decode(&record),
            Err(AutomatonError::MissingField("kind".to_string()))
        );
    }

    #[test]
    fn test_unknown_kind() {
        let mut record = dfa_record();
        record["kind"] = json!("pda");

        assert_eq!(
            decode(&record),
            Err(AutomatonError::UnknownKind("pda".to_string()))
        );
    }

    #[test]
    fn test_kind_is_case_insensitive() {
        let mut record = dfa_record();
        record["kind"] = json!("DFA");

        assert!(decode(&record).is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let mut record = dfa_record();
        record.as_object_mut().unwrap().remove("final_states");
        assert_eq!(
            decode(&record),
            Err(AutomatonError::MissingField("final_states".to_string()))
        );

        let mut record = tm_record();
        record.as_object_mut().unwrap().remove("tape_symbols");
        assert_eq!(
            decode(&record),
            Err(AutomatonError::MissingField("tape_symbols".to_string()))
        );
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let mut record = dfa_record();
        record["author"] = json!("someone");
        record["layout"] = json!({"q0": [0, 0]});

        assert!(decode(&record).is_ok());
    }

    #[test]
    fn test_type_mismatches_are_rejected() {
        let mut record = dfa_record();
        record["states"] = json!("q0");
        assert!(matches!(
            decode(&record),
            Err(AutomatonError::MalformedRecord(_))
        ));

        let mut record = dfa_record();
        record["transitions"]["q0"]["0"] = json!(["q0"]);
        assert!(matches!(
            decode(&record),
            Err(AutomatonError::MalformedRecord(_))
        ));

        let mut record = dfa_record();
        record["input_symbols"] = json!(["0", "10"]);
        assert!(matches!(
            decode(&record),
            Err(AutomatonError::MalformedRecord(_))
        ));

        let mut record = tm_record();
        record["transitions"]["q0"]["0"] = json!(["q0", "x", "UP"]);
        assert!(matches!(
            decode(&record),
            Err(AutomatonError::MalformedRecord(_))
        ));

        assert!(matches!(
            decode(&json!(["dfa"])),
            Err(AutomatonError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_undeclared_target_is_rejected() {
        let mut record = dfa_record();
        record["transitions"]["q1"]["0"] = json!("q7");

        assert_eq!(
            decode(&record),
            Err(AutomatonError::Structural(Violation::DanglingTarget {
                state: "q1".to_string(),
                target: "q7".to_string(),
            }))
        );
    }

    #[test]
    fn test_tm_blank_default() {
        let mut record = tm_record();
        record.as_object_mut().unwrap().remove("blank_symbol");
        record["transitions"]["q0"] = json!({"0": ["q0", "x", "R"], "_": ["q1", "_", "L"]});

        let tm = decode(&record).unwrap();
        assert_eq!(tm.blank(), Some(DEFAULT_BLANK_SYMBOL));
        assert_eq!(encode(&tm)["blank_symbol"], json!("_"));
    }

    #[test]
    fn test_decode_input() {
        let mut record = dfa_record();
        assert_eq!(decode_input(&record).unwrap(), "");

        record["input_string"] = json!("0101");
        assert_eq!(decode_input(&record).unwrap(), "0101");

        let mut record = tm_record();
        record["tape"] = json!(3);
        assert!(matches!(
            decode_input(&record),
            Err(AutomatonError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_encode_with_input() {
        let tm = decode(&tm_record()).unwrap();
        let record = encode_with_input(&tm, "0011");

        assert_eq!(record["tape"], json!("0011"));
        assert_eq!(decode_input(&record).unwrap(), "0011");
    }

    #[test]
    fn test_json_strings() {
        let dfa = decode(&dfa_record()).unwrap();
        let text = to_json(&dfa);

        assert_eq!(from_json(&text).unwrap(), dfa);
        assert!(matches!(
            from_json("{not json"),
            Err(AutomatonError::MalformedRecord(_))
        ));
    }
}
