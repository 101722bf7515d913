use argh::FromArgs;
use std::sync::LazyLock;

/// Deck debug arguments
#[derive(Debug, Default, FromArgs)]
pub struct DeckArgs {
    #[argh(switch, hidden_help)]
    pub no_transitions: bool,
    #[argh(switch, hidden_help)]
    pub animate: bool,
    #[argh(switch, hidden_help)]
    pub draw_picking_colors: bool,
    #[argh(switch, hidden_help)]
    pub force_headless: bool,

    #[argh(option, hidden_help)]
    pub picking_radius: Option<u32>,
}

impl DeckArgs {
    fn init() -> Option<DeckArgs> {
        let mut args = std::env::args();
        let cmd_name = args.next()?;
        let args: Vec<String> = args.collect();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        DeckArgs::from_args(&[&cmd_name], &args).ok()
    }

    pub fn get() -> &'static DeckArgs {
        static INSTANCE: LazyLock<DeckArgs> =
            LazyLock::new(|| DeckArgs::init().unwrap_or_default());
        &INSTANCE
    }

    pub fn default_picking_radius() -> u32 {
        DeckArgs::get().picking_radius.unwrap_or(0)
    }
}
