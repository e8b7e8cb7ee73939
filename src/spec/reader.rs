//! Reading a markup tree into a [`Kernel`]
//!
//! ```text
//! <kernel name="sgemm" namespace="blis">
//!     <query>
//!         <parameter name="k" type="uint64" default="256" min="1"/>
//!     </query>
//!     <call>
//!         <argument name="k" type="size_t"/>
//!     </call>
//! </kernel>
//! ```

use super::error::{SpecError, SpecResult};
use super::{ArgType, Argument, Kernel, Parameter, ScalarType};
use crate::ast::{Document, Element};
use crate::parser;
use crate::span::Span;
use std::collections::HashSet;
use tracing::{debug, warn};

const KERNEL_TAG: &str = "kernel";
const QUERY_TAG: &str = "query";
const CALL_TAG: &str = "call";
const PARAMETER_TAG: &str = "parameter";
const ARGUMENT_TAG: &str = "argument";

const KERNEL_ATTRIBUTES: &[&str] = &["name", "namespace"];
const PARAMETER_ATTRIBUTES: &[&str] = &["name", "type", "default", "min", "max"];
const ARGUMENT_ATTRIBUTES: &[&str] = &["name", "type"];

/// Parse a specification document into a kernel
pub fn parse_kernel(source: &str) -> SpecResult<Kernel> {
    let document = parser::parse(source)?;
    read_kernel(&document)
}

/// Read a parsed markup tree into a kernel
pub fn read_kernel(document: &Document) -> SpecResult<Kernel> {
    let root = &document.root;
    if root.tag() != KERNEL_TAG {
        return Err(SpecError::unexpected_root(root.tag(), root.name.span));
    }
    warn_unknown_attributes(root, KERNEL_ATTRIBUTES);

    let name = required_identifier(root, "name", "kernel name")?;
    let namespace = match root.attribute("namespace") {
        Some(attr) => {
            if !is_c_identifier(&attr.value) {
                return Err(SpecError::invalid_identifier("namespace", &attr.value, attr.span));
            }
            Some(attr.value.clone())
        }
        None => None,
    };

    let mut kernel = Kernel::new(name, namespace);
    kernel.span = root.span;

    let mut seen_query = false;
    let mut seen_call = false;
    for section in &root.children {
        match section.tag() {
            QUERY_TAG => {
                if std::mem::replace(&mut seen_query, true) {
                    return Err(SpecError::duplicate_section(QUERY_TAG, section.name.span));
                }
                warn_unknown_attributes(section, &[]);
                kernel.parameters = read_query(section)?;
            }
            CALL_TAG => {
                if std::mem::replace(&mut seen_call, true) {
                    return Err(SpecError::duplicate_section(CALL_TAG, section.name.span));
                }
                warn_unknown_attributes(section, &[]);
                kernel.arguments = read_call(section)?;
            }
            other => return Err(SpecError::unexpected_section(other, section.name.span)),
        }
    }

    debug!(
        kernel = %kernel.full_name(),
        parameters = kernel.parameters.len(),
        arguments = kernel.arguments.len(),
        "read kernel specification"
    );
    Ok(kernel)
}

fn read_query(section: &Element) -> SpecResult<Vec<Parameter>> {
    let mut parameters: Vec<Parameter> = Vec::new();
    let mut names = HashSet::new();

    for element in &section.children {
        if element.tag() != PARAMETER_TAG {
            return Err(SpecError::unexpected_declaration(
                QUERY_TAG,
                PARAMETER_TAG,
                element.tag(),
                element.name.span,
            ));
        }
        let parameter = read_parameter(element)?;
        if !names.insert(parameter.name.clone()) {
            return Err(SpecError::duplicate_parameter(&parameter.name, parameter.span));
        }
        parameters.push(parameter);
    }

    Ok(parameters)
}

fn read_parameter(element: &Element) -> SpecResult<Parameter> {
    reject_children(element)?;
    warn_unknown_attributes(element, PARAMETER_ATTRIBUTES);

    let name = required_identifier(element, "name", "parameter name")?;
    let type_attr = element
        .attribute("type")
        .ok_or_else(|| SpecError::missing_attribute(PARAMETER_TAG, "type", element.span))?;
    let ty = ScalarType::from_keyword(&type_attr.value)
        .ok_or_else(|| SpecError::unknown_parameter_type(&type_attr.value, type_attr.span))?;

    let default_attr = element
        .attribute("default")
        .ok_or_else(|| SpecError::missing_attribute(PARAMETER_TAG, "default", element.span))?;
    let default = parse_literal(&name, "default", &default_attr.value, ty, default_attr.span)?;

    let bound = |attribute: &str| -> SpecResult<Option<u64>> {
        match element.attribute(attribute) {
            Some(attr) => parse_literal(&name, attribute, &attr.value, ty, attr.span).map(Some),
            None => Ok(None),
        }
    };
    let min = bound("min")?;
    let max = bound("max")?;

    let lower = min.unwrap_or(0);
    let upper = max.unwrap_or(ty.max_value());
    if lower > upper {
        return Err(SpecError::empty_range(&name, lower, upper, element.span));
    }
    if default < lower || default > upper {
        return Err(SpecError::default_out_of_range(&name, default, lower, upper, default_attr.span));
    }

    Ok(Parameter {
        name,
        ty,
        default,
        min,
        max,
        span: element.span,
    })
}

fn read_call(section: &Element) -> SpecResult<Vec<Argument>> {
    let mut arguments: Vec<Argument> = Vec::new();
    let mut names = HashSet::new();

    for element in &section.children {
        if element.tag() != ARGUMENT_TAG {
            return Err(SpecError::unexpected_declaration(
                CALL_TAG,
                ARGUMENT_TAG,
                element.tag(),
                element.name.span,
            ));
        }
        reject_children(element)?;
        warn_unknown_attributes(element, ARGUMENT_ATTRIBUTES);

        let name = required_identifier(element, "name", "argument name")?;
        let type_attr = element
            .attribute("type")
            .ok_or_else(|| SpecError::missing_attribute(ARGUMENT_TAG, "type", element.span))?;
        let ty = ArgType::from_spelling(&type_attr.value)
            .ok_or_else(|| SpecError::unknown_argument_type(&type_attr.value, type_attr.span))?;

        if !names.insert(name.clone()) {
            return Err(SpecError::duplicate_argument(&name, element.span));
        }
        arguments.push(Argument {
            name,
            ty,
            span: element.span,
        });
    }

    Ok(arguments)
}

fn required_identifier(element: &Element, attribute: &str, what: &str) -> SpecResult<String> {
    let attr = element
        .attribute(attribute)
        .ok_or_else(|| SpecError::missing_attribute(element.tag(), attribute, element.span))?;
    if !is_c_identifier(&attr.value) {
        return Err(SpecError::invalid_identifier(what, &attr.value, attr.span));
    }
    Ok(attr.value.clone())
}

fn reject_children(element: &Element) -> SpecResult<()> {
    match element.children.first() {
        Some(child) => Err(SpecError::unexpected_child(element.tag(), child.tag(), child.name.span)),
        None => Ok(()),
    }
}

fn warn_unknown_attributes(element: &Element, known: &[&str]) {
    for attr in &element.attributes {
        if !known.contains(&attr.name.name.as_str()) {
            warn!(
                element = element.tag(),
                attribute = %attr.name.name,
                "ignoring unknown attribute"
            );
        }
    }
}

/// Parse an unsigned literal: decimal, or hexadecimal with a `0x` prefix
fn parse_literal(parameter: &str, attribute: &str, text: &str, ty: ScalarType, span: Span) -> SpecResult<u64> {
    let invalid = || SpecError::invalid_literal(parameter, attribute, text, ty.keyword(), span);
    let trimmed = text.trim();
    let parsed = if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        u64::from_str_radix(hex, 16)
    } else {
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        trimmed.parse::<u64>()
    };
    match parsed {
        Ok(value) if value <= ty.max_value() => Ok(value),
        _ => Err(invalid()),
    }
}

/// Whether `name` can be used verbatim as a C identifier
pub fn is_c_identifier(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(first) if first == b'_' || first.is_ascii_alphabetic() => {
            bytes.all(|b| b == b'_' || b.is_ascii_alphanumeric())
        }
        _ => false,
    }
}
