//! Declarative form rendering.
//!
//! `render_form` turns a resource schema plus the caller's policy into a
//! [`FormDescriptor`] the frontend can paint mechanically, and
//! `validate_submission` re-checks a submission against the same rendered
//! constraints so a tampered client cannot bypass them.

use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::authz::{Limitation, Role, TeamPolicy};
use crate::errors::AppError;
use crate::schema::{display_name, FieldSpec, ResourceSchema};

pub const APPROVAL_NOTICE: &str = "* Requires approval from the platform team";

/// Input widget, chosen by field type.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Widget {
    Choice {
        options: Vec<String>,
    },
    Toggle,
    Numeric {
        #[serde(skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },
    Text {
        #[serde(skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FieldDescriptor {
    pub name: String,
    pub label: String,
    /// Heading for fields flattened out of a nested schema object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub widget: Widget,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EnvironmentOption {
    pub name: String,
    pub requires_approval: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_notice: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FormDescriptor {
    pub resource: String,
    pub title: String,
    pub fields: Vec<FieldDescriptor>,
    pub environments: Vec<EnvironmentOption>,
}

/// Renders the constrained form for one resource kind.
///
/// Pure: same schema, role and policy always produce the same descriptor.
pub fn render_form(kind: &str, schema: &ResourceSchema, role: Role, policy: &TeamPolicy) -> FormDescriptor {
    let fields = schema
        .flattened_fields()
        .into_iter()
        .map(|field| render_field(kind, field.name, field.spec, field.section, policy))
        .collect();

    let environments = policy
        .environments
        .iter()
        .map(|env| {
            let notice = approval_notice(role, policy, env);
            EnvironmentOption {
                name: env.clone(),
                requires_approval: notice.is_some(),
                approval_notice: notice,
            }
        })
        .collect();

    FormDescriptor {
        resource: kind.to_string(),
        title: format!("Create {}", display_name(kind)),
        fields,
        environments,
    }
}

fn render_field(
    kind: &str,
    name: &str,
    spec: &FieldSpec,
    section: Option<String>,
    policy: &TeamPolicy,
) -> FieldDescriptor {
    let mut widget = widget_for(spec);
    if let Some(limitation) = policy.limitation(kind, name) {
        widget = apply_limitation(widget, limitation);
    }

    FieldDescriptor {
        name: name.to_string(),
        label: spec.title.clone().unwrap_or_else(|| display_name(name)),
        section,
        widget,
        default: spec.default.clone(),
        help: spec.description.clone(),
    }
}

fn widget_for(spec: &FieldSpec) -> Widget {
    if let Some(options) = &spec.enum_values {
        return Widget::Choice {
            options: options.clone(),
        };
    }
    if spec.is_boolean() {
        return Widget::Toggle;
    }
    if spec.is_number() {
        return Widget::Numeric {
            minimum: spec.minimum,
            maximum: spec.maximum,
        };
    }
    Widget::Text {
        pattern: spec.pattern.clone(),
    }
}

/// Applies one team limitation to a rendered widget.
///
/// Choice options are intersected with the allowed set (disallowed options
/// removed, schema order kept); a numeric upper bound is clamped down to the
/// limitation. Mismatched shapes leave the widget untouched.
fn apply_limitation(widget: Widget, limitation: &Limitation) -> Widget {
    match (widget, limitation) {
        (Widget::Choice { options }, Limitation::Allowed(allowed)) => Widget::Choice {
            options: options
                .into_iter()
                .filter(|option| allowed.iter().any(|a| a == option))
                .collect(),
        },
        (Widget::Numeric { minimum, maximum }, Limitation::Maximum(cap)) => Widget::Numeric {
            minimum,
            maximum: Some(match maximum {
                Some(max) if max < *cap => max,
                _ => *cap,
            }),
        },
        (widget, _) => widget,
    }
}

/// The approval notice is shown iff the role is contributor and the selected
/// environment requires approval; admins never see it.
pub fn approval_notice(role: Role, policy: &TeamPolicy, environment: &str) -> Option<String> {
    if role == Role::Contributor && policy.requires_approval(environment) {
        Some(APPROVAL_NOTICE.to_string())
    } else {
        None
    }
}

/// Re-validates a submission against the rendered constraints.
///
/// This is the enforcement half of the limitation handling: a value that
/// would not have been presentable is rejected even if the client sent it.
pub fn validate_submission(
    form: &FormDescriptor,
    name: &str,
    environment: &str,
    values: &Map<String, Value>,
) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::validation("resource name must not be empty"));
    }
    if !form.environments.iter().any(|env| env.name == environment) {
        return Err(AppError::validation(format!(
            "environment '{environment}' is not available for this role"
        )));
    }

    for (field, value) in values {
        let descriptor = form
            .fields
            .iter()
            .find(|f| f.name == *field)
            .ok_or_else(|| AppError::validation(format!("unknown field '{field}'")))?;

        match &descriptor.widget {
            Widget::Choice { options } => {
                let raw = value.as_str().ok_or_else(|| {
                    AppError::validation(format!("field '{field}' expects one of its options"))
                })?;
                if !options.iter().any(|option| option == raw) {
                    return Err(AppError::validation(format!(
                        "value '{raw}' is not allowed for field '{field}'"
                    )));
                }
            }
            Widget::Numeric { minimum, maximum } => {
                let number = numeric_value(value).ok_or_else(|| {
                    AppError::validation(format!("field '{field}' expects a number"))
                })?;
                if let Some(max) = maximum {
                    if number > *max {
                        return Err(AppError::validation(format!(
                            "field '{field}' exceeds the maximum of {max}"
                        )));
                    }
                }
                if let Some(min) = minimum {
                    if number < *min {
                        return Err(AppError::validation(format!(
                            "field '{field}' is below the minimum of {min}"
                        )));
                    }
                }
            }
            Widget::Toggle => {
                if boolean_value(value).is_none() {
                    return Err(AppError::validation(format!(
                        "field '{field}' expects true or false"
                    )));
                }
            }
            Widget::Text { .. } => {
                if !value.is_string() {
                    return Err(AppError::validation(format!("field '{field}' expects text")));
                }
            }
        }
    }

    Ok(())
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

fn boolean_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(raw) => match raw.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
