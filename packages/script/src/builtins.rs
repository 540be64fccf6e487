//! Built-in commands.

use std::io::Write;

use crate::error::{Result, ScriptError};
use crate::interp::Interp;
use crate::obj::Obj;
use crate::photo;

pub(crate) fn install(interp: &Interp) {
    interp.create_command("set", cmd_set, None);
    interp.create_command("unset", cmd_unset, None);
    interp.create_command("incr", cmd_incr, None);
    interp.create_command("append", cmd_append, None);
    interp.create_command("puts", cmd_puts, None);
    interp.create_command("rename", cmd_rename, None);
    interp.create_command("info", cmd_info, None);
    interp.create_command("error", cmd_error, None);
    interp.create_command("catch", cmd_catch, None);
    interp.create_command("image", cmd_image, None);
    interp.create_command("update", cmd_update, None);
    interp.create_command("exit", cmd_exit, None);
}

fn name_of(obj: &Obj) -> String {
    obj.to_string_lossy()
}

fn cmd_set(interp: &Interp, objv: &[Obj]) -> Result<Obj> {
    match objv {
        [_, name] => interp.get_var(&name_of(name)),
        [_, name, value] => interp.set_var(&name_of(name), value.clone()),
        _ => Err(ScriptError::wrong_args("set varName ?newValue?")),
    }
}

fn cmd_unset(interp: &Interp, objv: &[Obj]) -> Result<Obj> {
    let mut names = &objv[1..];
    let mut complain = true;
    if names.first().is_some_and(|arg| arg.as_bytes() == "-nocomplain") {
        complain = false;
        names = &names[1..];
    }
    for name in names {
        match interp.unset_var(&name_of(name)) {
            Err(err) if complain => return Err(err),
            _ => {}
        }
    }
    Ok(Obj::empty())
}

/// `incr varName ?increment?`. A missing variable starts at zero.
fn cmd_incr(interp: &Interp, objv: &[Obj]) -> Result<Obj> {
    let (name, increment) = match objv {
        [_, name] => (name_of(name), 1),
        [_, name, increment] => (name_of(name), increment.get_wide_int()?),
        _ => return Err(ScriptError::wrong_args("incr varName ?increment?")),
    };
    let current = match interp.get_var(&name) {
        Ok(value) => value.get_wide_int()?,
        Err(_) => 0,
    };
    interp.set_var(&name, Obj::from_wide_int(current.wrapping_add(increment)))
}

fn cmd_append(interp: &Interp, objv: &[Obj]) -> Result<Obj> {
    let Some(name) = objv.get(1).map(name_of) else {
        return Err(ScriptError::wrong_args("append varName ?value ...?"));
    };
    let mut buf = interp
        .get_var(&name)
        .map(|value| value.as_bytes().to_vec())
        .unwrap_or_default();
    if objv.len() == 2 && interp.var_exists(&name) {
        return interp.get_var(&name);
    }
    for value in &objv[2..] {
        buf.extend_from_slice(&value.as_bytes());
    }
    interp.set_var(&name, Obj::from(buf))
}

fn cmd_puts(_interp: &Interp, objv: &[Obj]) -> Result<Obj> {
    let mut args = &objv[1..];
    let mut newline = true;
    if args.len() > 1 && args[0].as_bytes() == "-nonewline" {
        newline = false;
        args = &args[1..];
    }
    let (channel, text) = match args {
        [text] => ("stdout".to_string(), text),
        [channel, text] => (name_of(channel), text),
        _ => {
            return Err(ScriptError::wrong_args(
                "puts ?-nonewline? ?channelId? string",
            ))
        }
    };

    let mut bytes = text.as_bytes().to_vec();
    if newline {
        bytes.push(b'\n');
    }
    let written = match channel.as_str() {
        "stdout" => std::io::stdout().lock().write_all(&bytes),
        "stderr" => std::io::stderr().lock().write_all(&bytes),
        other => {
            return Err(ScriptError::new(format!(
                "can not find channel named \"{}\"",
                other
            )))
        }
    };
    written.map_err(|e| ScriptError::new(format!("error writing \"{}\": {}", channel, e)))?;
    Ok(Obj::empty())
}

fn cmd_rename(interp: &Interp, objv: &[Obj]) -> Result<Obj> {
    match objv {
        [_, old, new] => {
            interp.rename_command(&name_of(old), &name_of(new))?;
            Ok(Obj::empty())
        }
        _ => Err(ScriptError::wrong_args("rename oldName newName")),
    }
}

fn cmd_info(interp: &Interp, objv: &[Obj]) -> Result<Obj> {
    let option = objv.get(1).map(name_of).unwrap_or_default();
    match (option.as_str(), &objv[1..]) {
        ("exists", [_, name]) => Ok(Obj::from_boolean(interp.var_exists(&name_of(name)))),
        ("exists", _) => Err(ScriptError::wrong_args("info exists varName")),
        ("commands", [_]) => Ok(Obj::from(format_list(interp.command_names()))),
        ("commands", [_, pattern]) => {
            let pattern = name_of(pattern);
            let names = interp
                .command_names()
                .into_iter()
                .filter(|name| glob_match(pattern.as_bytes(), name.as_bytes()));
            Ok(Obj::from(format_list(names)))
        }
        ("commands", _) => Err(ScriptError::wrong_args("info commands ?pattern?")),
        ("", _) => Err(ScriptError::wrong_args("info subcommand ?arg ...?")),
        (other, _) => Err(ScriptError::new(format!(
            "unknown or ambiguous subcommand \"{}\": must be commands or exists",
            other
        ))),
    }
}

fn cmd_error(_interp: &Interp, objv: &[Obj]) -> Result<Obj> {
    match objv {
        [_, message] => Err(ScriptError::new(message.to_string_lossy())),
        _ => Err(ScriptError::wrong_args("error message")),
    }
}

/// `catch script ?resultVarName?`: 0 on success, 1 on error.
fn cmd_catch(interp: &Interp, objv: &[Obj]) -> Result<Obj> {
    let (script, var) = match objv {
        [_, script] => (script, None),
        [_, script, var] => (script, Some(name_of(var))),
        _ => return Err(ScriptError::wrong_args("catch script ?resultVarName?")),
    };
    let (code, value) = match interp.eval_script(&script.as_bytes()) {
        Ok(result) => (0, result),
        Err(err) => (1, Obj::from(err.message())),
    };
    if let Some(var) = var {
        interp.set_var(&var, value)?;
    }
    Ok(Obj::from_wide_int(code))
}

fn cmd_image(interp: &Interp, objv: &[Obj]) -> Result<Obj> {
    let option = objv.get(1).map(name_of).unwrap_or_default();
    match (option.as_str(), &objv[1..]) {
        ("create", [_, kind, rest @ ..]) if rest.len() <= 1 => {
            let kind = name_of(kind);
            if kind != "photo" {
                return Err(ScriptError::new(format!(
                    "image type \"{}\" doesn't exist",
                    kind
                )));
            }
            let name = rest.first().map(name_of);
            let handle = interp.create_photo(name.as_deref());
            Ok(Obj::from(handle.name()))
        }
        ("create", _) => Err(ScriptError::wrong_args("image create type ?name?")),
        ("delete", [_, names @ ..]) => {
            for name in names.iter().map(name_of) {
                if !interp.photos.remove(&name) {
                    return Err(photo::not_found(&name));
                }
                let _ = interp.delete_command(&name);
            }
            Ok(Obj::empty())
        }
        ("names", [_]) => Ok(Obj::from(format_list(interp.photos.names()))),
        ("width" | "height" | "type", [_, name]) => {
            let name = name_of(name);
            let (width, height) = interp
                .photo_size(&name)
                .ok_or_else(|| photo::not_found(&name))?;
            Ok(match option.as_str() {
                "width" => Obj::from_wide_int(i64::from(width)),
                "height" => Obj::from_wide_int(i64::from(height)),
                _ => Obj::from("photo"),
            })
        }
        ("", _) => Err(ScriptError::wrong_args("image option ?args?")),
        ("names", _) => Err(ScriptError::wrong_args("image names")),
        ("width" | "height" | "type", _) => Err(ScriptError::wrong_args(&format!(
            "image {} name",
            option
        ))),
        (other, _) => Err(ScriptError::new(format!(
            "bad option \"{}\": must be create, delete, height, names, type, or width",
            other
        ))),
    }
}

/// Run pending events without waiting for new ones.
fn cmd_update(interp: &Interp, objv: &[Obj]) -> Result<Obj> {
    if objv.len() != 1 {
        return Err(ScriptError::wrong_args("update"));
    }
    interp.process_pending_events();
    Ok(Obj::empty())
}

/// `exit ?returnCode?` ends the event loop once the current event is done.
fn cmd_exit(interp: &Interp, objv: &[Obj]) -> Result<Obj> {
    match objv {
        [_] => {}
        [_, code] => {
            code.get_wide_int()?;
        }
        _ => return Err(ScriptError::wrong_args("exit ?returnCode?")),
    }
    interp.request_exit();
    Ok(Obj::empty())
}

/// Format items as a list, bracing elements that need it.
pub(crate) fn format_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|item| {
            let item = item.as_ref();
            let needs_braces = item.is_empty()
                || item.chars().any(|c| {
                    c.is_whitespace() || matches!(c, '{' | '}' | '[' | ']' | '$' | '"' | '\\' | ';')
                });
            if needs_braces {
                format!("{{{}}}", item)
            } else {
                item.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Glob matching with `*`, `?` and `\` escapes.
pub(crate) fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some((b'*', rest)) => (0..=text.len()).any(|skip| glob_match(rest, &text[skip..])),
        Some((b'?', rest)) => !text.is_empty() && glob_match(rest, &text[1..]),
        Some((b'\\', rest)) if !rest.is_empty() => {
            text.first() == rest.first() && glob_match(&rest[1..], &text[1..])
        }
        Some((c, rest)) => text.first() == Some(c) && glob_match(rest, &text[1..]),
    }
}
