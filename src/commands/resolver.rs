//! Overload resolution.
//!
//! Overloads are tried in registration order and the first one whose every
//! parameter binds is selected. There is no scoring by arity or specificity:
//! declaration order is the tie-break.

use tracing::debug;

use super::context::{BoundArguments, MessageContext};
use super::converters::ConverterRegistry;
use super::definitions::{Command, Overload, Parameter};
use super::tokenizer::Tokens;
use crate::error::{ConversionFailure, FeasibilityFailure, OverloadFailure};

/// The selected overload and its bound arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Registration index of the selected overload.
    pub overload: usize,
    pub arguments: BoundArguments,
}

/// Picks the first overload of `command` that binds `tokens`.
///
/// On failure returns one [`OverloadFailure`] per overload, in registration order.
pub async fn resolve(
    command: &Command,
    tokens: &Tokens,
    converters: &ConverterRegistry,
    ctx: &MessageContext,
) -> Result<Resolution, Vec<OverloadFailure>> {
    let mut failures = Vec::with_capacity(command.overloads().len());

    for (index, overload) in command.overloads().iter().enumerate() {
        match bind_overload(overload, tokens, converters, ctx).await {
            Ok(arguments) => {
                debug!(command = command.name(), overload = index, "Overload bound");
                return Ok(Resolution {
                    overload: index,
                    arguments,
                });
            }
            Err(failure) => {
                debug!(
                    command = command.name(),
                    overload = index,
                    reason = %failure,
                    "Overload rejected"
                );
                failures.push(OverloadFailure {
                    overload: index,
                    signature: overload.usage(command.name()),
                    failure,
                });
            }
        }
    }

    Err(failures)
}

/// Binds every parameter of `overload` or reports why it cannot.
pub async fn bind_overload(
    overload: &Overload,
    tokens: &Tokens,
    converters: &ConverterRegistry,
    ctx: &MessageContext,
) -> Result<BoundArguments, FeasibilityFailure> {
    let params = overload.parameters();

    // Arity checks first, so infeasible overloads never reach a converter.
    if !overload.has_remainder() && tokens.len() > params.len() {
        return Err(FeasibilityFailure::TooManyArguments {
            expected: params.len(),
            supplied: tokens.len(),
        });
    }
    let required = overload.required_count();
    if tokens.len() < required {
        // Required parameters form a prefix, so this one has no token.
        return Err(FeasibilityFailure::MissingArgument {
            parameter: params[tokens.len()].name.clone(),
        });
    }

    let mut arguments = BoundArguments::new();
    let mut next = 0;

    for param in params {
        if next >= tokens.len() {
            bind_missing(param, &mut arguments)?;
            continue;
        }

        let raw = if param.remainder {
            let raw = tokens.remainder_from(next).to_string();
            next = tokens.len();
            raw
        } else {
            let token = tokens.get(next).map(|t| t.value.clone()).unwrap_or_default();
            next += 1;
            token
        };

        let value = converters
            .convert(param.arg_type, &raw, ctx)
            .await
            .map_err(|reason| {
                FeasibilityFailure::Conversion(ConversionFailure::new(
                    &param.name,
                    param.arg_type,
                    &raw,
                    reason,
                ))
            })?;
        arguments.push(&param.name, value);
    }

    Ok(arguments)
}

fn bind_missing(param: &Parameter, arguments: &mut BoundArguments) -> Result<(), FeasibilityFailure> {
    if let Some(default) = &param.default {
        arguments.push(&param.name, default.clone());
        Ok(())
    } else if param.optional {
        Ok(())
    } else {
        Err(FeasibilityFailure::MissingArgument {
            parameter: param.name.clone(),
        })
    }
}
