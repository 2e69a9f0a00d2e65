use serde_json::json;

use super::{CmdResult, Context, print_json};
use crate::cli::commands::{ConfigKeyArg, ConfigSetArgs, ThemeArgs};
use crate::io::config_io::{self, ConfigError};
use crate::model::ThemeMode;
use crate::ops::filter::SortOrder;

pub fn cmd_theme(ctx: &Context, args: ThemeArgs) -> CmdResult {
    let current = ctx.config.ui.theme;
    let target = match args.mode.as_deref() {
        None => None,
        Some("toggle") => Some(current.toggled()),
        Some(mode) => Some(mode.parse::<ThemeMode>()?),
    };

    let theme = match target {
        Some(theme) if theme != current => {
            let (_, mut doc) = config_io::read_config(&ctx.config_path)?;
            config_io::set_value(&mut doc, "ui.theme", theme.as_str())?;
            config_io::write_config(&ctx.config_path, &doc)?;
            theme
        }
        _ => current,
    };

    if ctx.json {
        print_json(&json!({ "theme": theme }))
    } else {
        println!("{}", theme);
        Ok(())
    }
}

pub fn cmd_config_show(ctx: &Context) -> CmdResult {
    if ctx.json {
        return print_json(&ctx.config);
    }
    for key in config_io::known_keys() {
        println!("{} = {}", key, config_io::get_value(&ctx.config, key)?);
    }
    Ok(())
}

pub fn cmd_config_get(ctx: &Context, args: ConfigKeyArg) -> CmdResult {
    let value = config_io::get_value(&ctx.config, &args.key)?;
    if ctx.json {
        print_json(&json!({ "key": args.key, "value": value }))
    } else {
        println!("{}", value);
        Ok(())
    }
}

pub fn cmd_config_set(ctx: &Context, args: ConfigSetArgs) -> CmdResult {
    if args.key == "ui.default_sort" {
        args.value
            .parse::<SortOrder>()
            .map_err(|message| ConfigError::InvalidValue {
                key: args.key.clone(),
                message,
            })?;
    }

    let (_, mut doc) = config_io::read_config(&ctx.config_path)?;
    config_io::set_value(&mut doc, &args.key, &args.value)?;
    config_io::write_config(&ctx.config_path, &doc)?;

    if ctx.json {
        print_json(&json!({ "key": args.key, "value": args.value }))
    } else {
        println!("{} = {}", args.key, args.value);
        Ok(())
    }
}
