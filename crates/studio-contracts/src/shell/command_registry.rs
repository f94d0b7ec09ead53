#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
    /// `command_args` key the raw argument is stored under.
    pub arg_key: &'static str,
}

pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "image_model",
        action: "set_image_model",
        arg_key: "model",
    },
    CommandSpec {
        command: "video_model",
        action: "set_video_model",
        arg_key: "model",
    },
    CommandSpec {
        command: "ratio",
        action: "set_aspect_ratio",
        arg_key: "value",
    },
    CommandSpec {
        command: "resolution",
        action: "set_resolution",
        arg_key: "value",
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "upload",
        action: "upload",
        arg_key: "path",
    },
    CommandSpec {
        command: "save",
        action: "save",
        arg_key: "filename",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "image",
        action: "switch_image",
        arg_key: "",
    },
    CommandSpec {
        command: "video",
        action: "switch_video",
        arg_key: "",
    },
    CommandSpec {
        command: "enhance",
        action: "enhance",
        arg_key: "",
    },
    CommandSpec {
        command: "clear",
        action: "clear_source",
        arg_key: "",
    },
    CommandSpec {
        command: "key",
        action: "select_key",
        arg_key: "",
    },
    CommandSpec {
        command: "help",
        action: "help",
        arg_key: "",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
        arg_key: "",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
        arg_key: "",
    },
];

pub const SHELL_HELP_COMMANDS: &[&str] = &[
    "/image",
    "/video",
    "/upload",
    "/clear",
    "/enhance",
    "/ratio",
    "/resolution",
    "/save",
    "/image_model",
    "/video_model",
    "/key",
    "/help",
    "/quit",
];
