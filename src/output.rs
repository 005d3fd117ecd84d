//! Go source emission.
//!
//! Declarations come out of the model's `BTreeMap`s already sorted by
//! name, so identical models always emit byte-identical files. Structs
//! whose schema admits additional properties get hand-rolled
//! `MarshalJSON`/`UnmarshalJSON` methods that route unknown keys through
//! the overflow map; everything else relies on plain `encoding/json`
//! struct tags.

use std::io::{self, Write};

use crate::typegen::{Field, StructDef, TypeModel, ADDITIONAL_PROPERTIES_FIELD};

/// Writes the complete generated Go file for `model`.
///
/// # Errors
///
/// Returns any error from the underlying writer.
pub fn output<W: Write>(writer: &mut W, model: &TypeModel, package: &str) -> io::Result<()> {
    writeln!(writer, "// Code generated by go-schema-gen. DO NOT EDIT.")?;
    writeln!(writer)?;
    writeln!(writer, "package {package}")?;

    let needs_imports: bool = model
        .structs
        .values()
        .any(|s| s.additional_value_type.is_some());
    if needs_imports {
        writeln!(writer)?;
        writeln!(writer, "import (")?;
        writeln!(writer, "  \"bytes\"")?;
        writeln!(writer, "  \"encoding/json\"")?;
        writeln!(writer, "  \"fmt\"")?;
        writeln!(writer, ")")?;
    }

    for alias in model.aliases.values() {
        writeln!(writer)?;
        if let Some(comment) = &alias.comment {
            writeln!(writer, "// {} {}", alias.name, comment)?;
        }
        writeln!(writer, "type {} {}", alias.name, alias.type_name)?;
    }

    for strct in model.structs.values() {
        writeln!(writer)?;
        if let Some(description) = &strct.description {
            writeln!(writer, "// {} {}", strct.name, description)?;
        }
        writeln!(writer, "type {} struct {{", strct.name)?;
        for field in strct.fields.values() {
            if let Some(comment) = &field.comment {
                writeln!(writer, "  // {comment}")?;
            }
            writeln!(
                writer,
                "  {} {} `json:\"{}\"`",
                field.name,
                field.type_name,
                tag(field)
            )?;
        }
        writeln!(writer, "}}")?;

        if let Some(avt) = &strct.additional_value_type {
            let bag: &str = bag_field_name(strct);
            emit_marshal(writer, strct, bag)?;
            emit_unmarshal(writer, strct, avt, bag)?;
        }
    }
    Ok(())
}

fn tag(field: &Field) -> String {
    if field.json_name == "-" {
        "-".to_string()
    } else if field.required {
        field.json_name.clone()
    } else {
        format!("{},omitempty", field.json_name)
    }
}

/// Declared fields are written in order, then the overflow map; a `comma`
/// flag keeps the output valid when every declared field is empty.
fn emit_marshal<W: Write>(writer: &mut W, strct: &StructDef, bag: &str) -> io::Result<()> {
    writeln!(writer)?;
    writeln!(
        writer,
        "func (strct *{}) MarshalJSON() ([]byte, error) {{",
        strct.name
    )?;
    writeln!(writer, "  buf := bytes.NewBuffer([]byte{{}})")?;
    writeln!(writer, "  buf.WriteString(\"{{\")")?;
    writeln!(writer, "  comma := false")?;
    for field in declared_fields(strct) {
        writeln!(writer, "  // Marshal the \"{}\" field", field.json_name)?;
        writeln!(writer, "  if comma {{")?;
        writeln!(writer, "    buf.WriteString(\",\")")?;
        writeln!(writer, "  }}")?;
        writeln!(writer, "  buf.WriteString(\"\\\"{}\\\": \")", field.json_name)?;
        writeln!(
            writer,
            "  if tmp, err := json.Marshal(strct.{}); err != nil {{",
            field.name
        )?;
        writeln!(writer, "    return nil, err")?;
        writeln!(writer, "  }} else {{")?;
        writeln!(writer, "    buf.Write(tmp)")?;
        writeln!(writer, "  }}")?;
        writeln!(writer, "  comma = true")?;
    }
    writeln!(writer, "  // Marshal any additional properties")?;
    writeln!(writer, "  for k, v := range strct.{bag} {{")?;
    writeln!(writer, "    if comma {{")?;
    writeln!(writer, "      buf.WriteString(\",\")")?;
    writeln!(writer, "    }}")?;
    writeln!(
        writer,
        "    buf.WriteString(fmt.Sprintf(\"\\\"%s\\\": \", k))"
    )?;
    writeln!(writer, "    if tmp, err := json.Marshal(v); err != nil {{")?;
    writeln!(writer, "      return nil, err")?;
    writeln!(writer, "    }} else {{")?;
    writeln!(writer, "      buf.Write(tmp)")?;
    writeln!(writer, "    }}")?;
    writeln!(writer, "    comma = true")?;
    writeln!(writer, "  }}")?;
    writeln!(writer, "  buf.WriteString(\"}}\")")?;
    writeln!(writer, "  return buf.Bytes(), nil")?;
    writeln!(writer, "}}")?;
    Ok(())
}

/// Known keys unmarshal into their declared fields; every other key
/// decodes as the additional value type into the overflow map, which is
/// allocated on first use.
fn emit_unmarshal<W: Write>(
    writer: &mut W,
    strct: &StructDef,
    avt: &str,
    bag: &str,
) -> io::Result<()> {
    writeln!(writer)?;
    writeln!(
        writer,
        "func (strct *{}) UnmarshalJSON(b []byte) error {{",
        strct.name
    )?;
    writeln!(writer, "  var jsonMap map[string]json.RawMessage")?;
    writeln!(writer, "  if err := json.Unmarshal(b, &jsonMap); err != nil {{")?;
    writeln!(writer, "    return err")?;
    writeln!(writer, "  }}")?;
    writeln!(writer, "  for k, v := range jsonMap {{")?;
    writeln!(writer, "    switch k {{")?;
    for field in declared_fields(strct) {
        writeln!(writer, "    case \"{}\":", field.json_name)?;
        writeln!(
            writer,
            "      if err := json.Unmarshal([]byte(v), &strct.{}); err != nil {{",
            field.name
        )?;
        writeln!(writer, "        return err")?;
        writeln!(writer, "      }}")?;
    }
    writeln!(writer, "    default:")?;
    writeln!(writer, "      var additionalValue {avt}")?;
    writeln!(
        writer,
        "      if err := json.Unmarshal([]byte(v), &additionalValue); err != nil {{"
    )?;
    writeln!(writer, "        return err")?;
    writeln!(writer, "      }}")?;
    writeln!(writer, "      if strct.{bag} == nil {{")?;
    writeln!(writer, "        strct.{bag} = make(map[string]{avt})")?;
    writeln!(writer, "      }}")?;
    writeln!(writer, "      strct.{bag}[k] = additionalValue")?;
    writeln!(writer, "    }}")?;
    writeln!(writer, "  }}")?;
    writeln!(writer, "  return nil")?;
    writeln!(writer, "}}")?;
    Ok(())
}

fn declared_fields(strct: &StructDef) -> impl Iterator<Item = &Field> {
    strct.fields.values().filter(|f| f.json_name != "-")
}

/// The overflow map's Go field name. It is usually
/// `AdditionalProperties`, but carries a numeric suffix when a declared
/// property claimed that name first.
fn bag_field_name(strct: &StructDef) -> &str {
    strct
        .fields
        .values()
        .find(|f| f.json_name == "-")
        .map_or(ADDITIONAL_PROPERTIES_FIELD, |f| f.name.as_str())
}
