//! Parameter commands that may appear inside `{...}` in a string.

use std::collections::HashMap;
use std::sync::OnceLock;

/// What a `{P ..}` or `{G ..}` selection may use an argument for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// A number; plural selection can refer to it.
    Numeric,
    /// A string; gender selection can refer to it.
    Text,
    /// Neither.
    Plain,
}

/// A known parameter command.
#[derive(Debug, Clone)]
pub struct CommandInfo {
    /// Literal name between the braces, e.g. `NUM`
    pub name: &'static str,

    /// One entry per argument the command consumes
    pub args: &'static [ArgKind],

    /// Occurrence count must match between base and translation
    pub critical: bool,

    /// Accepts a `.case` suffix
    pub allow_case: bool,
}

impl CommandInfo {
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    pub fn accepts_plural(&self) -> bool {
        self.args.contains(&ArgKind::Numeric)
    }

    pub fn accepts_gender(&self) -> bool {
        self.args.contains(&ArgKind::Text)
    }
}

/// Lookup table of commands by name.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: HashMap<&'static str, CommandInfo>,
}

static BUILTIN: OnceLock<CommandRegistry> = OnceLock::new();

impl CommandRegistry {
    pub fn new(commands: impl IntoIterator<Item = CommandInfo>) -> Self {
        Self {
            commands: commands.into_iter().map(|c| (c.name, c)).collect(),
        }
    }

    /// Commands understood by the game's string compiler.
    pub fn builtin() -> &'static CommandRegistry {
        BUILTIN.get_or_init(|| CommandRegistry::new(builtin_commands()))
    }

    pub fn get(&self, name: &str) -> Option<&CommandInfo> {
        self.commands.get(name)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

const NONE: &[ArgKind] = &[];
const NUMERIC: &[ArgKind] = &[ArgKind::Numeric];
const TEXT: &[ArgKind] = &[ArgKind::Text];
const PLAIN: &[ArgKind] = &[ArgKind::Plain];
const CARGO: &[ArgKind] = &[ArgKind::Plain, ArgKind::Numeric];

fn builtin_commands() -> Vec<CommandInfo> {
    let layout = [
        "BLUE", "SILVER", "GOLD", "RED", "PURPLE", "LTBROWN", "ORANGE", "GREEN", "YELLOW",
        "DKGREEN", "CREAM", "BROWN", "WHITE", "LTBLUE", "GRAY", "DKBLUE", "BLACK", "TINYFONT",
        "BIGFONT", "NBSP", "COPYRIGHT", "UP_ARROW", "DOWN_ARROW", "CHECKMARK", "CROSS",
        "RIGHT_ARROW", "SMALL_LEFT_ARROW", "SMALL_RIGHT_ARROW", "TRAIN", "LORRY", "BUS", "PLANE",
        "SHIP", "PUSH_COLOUR", "POP_COLOUR",
    ]
    .into_iter()
    .map(|name| CommandInfo {
        name,
        args: NONE,
        critical: false,
        allow_case: false,
    });

    let parameters = [
        ("STRING", TEXT, true),
        ("RAW_STRING", PLAIN, false),
        ("COMMA", NUMERIC, false),
        ("SIGNED_WORD", NUMERIC, false),
        ("UNSIGNED_WORD", NUMERIC, false),
        ("NUM", NUMERIC, false),
        ("ZEROFILL_NUM", NUMERIC, false),
        ("HEX", NUMERIC, false),
        ("CURRENCY", NUMERIC, false),
        ("CURRENCY_LONG", NUMERIC, false),
        ("CURRENCY_SHORT", NUMERIC, false),
        ("VELOCITY", NUMERIC, false),
        ("VOLUME", NUMERIC, false),
        ("VOLUME_SHORT", NUMERIC, false),
        ("POWER", NUMERIC, false),
        ("WEIGHT", NUMERIC, false),
        ("WEIGHT_SHORT", NUMERIC, false),
        ("HEIGHT", NUMERIC, false),
        ("FORCE", NUMERIC, false),
        ("DATE_LONG", PLAIN, false),
        ("DATE_SHORT", PLAIN, false),
        ("DATE_TINY", PLAIN, false),
        ("CARGO_LONG", CARGO, false),
        ("CARGO_SHORT", CARGO, false),
        ("CARGO_TINY", CARGO, false),
        ("STATION", TEXT, false),
        ("TOWN", TEXT, false),
    ]
    .into_iter()
    .map(|(name, args, allow_case)| CommandInfo {
        name,
        args,
        critical: true,
        allow_case,
    });

    layout.chain(parameters).collect()
}
