//! Settings command.

use crate::error::Result;

use super::Context;

pub fn run(ctx: &Context, key: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(value) => {
            ctx.db.set_setting(key, value)?;
            println!("{key} = {value}");
        }
        None => match ctx.db.get_setting(key)? {
            Some(value) => println!("{value}"),
            None => println!("(unset)"),
        },
    }
    Ok(())
}
