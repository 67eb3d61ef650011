use crate::error::Result;
use crate::volume::{self, ReverseIndex};
use std::collections::BTreeMap;

/// Code → label mapping
pub type Table = BTreeMap<String, String>;

fn table(entries: &[(&str, &str)]) -> Table {
    entries
        .iter()
        .map(|(code, label)| (code.to_string(), label.to_string()))
        .collect()
}

fn with(mut base: Table, extra: Table) -> Table {
    base.extend(extra);
    base
}

/// Subcommands of a command, with the token lengths used for matching
#[derive(Debug, Clone)]
pub struct SubcommandTable {
    entries: Table,
    min_len: usize,
    max_len: usize,
}

impl SubcommandTable {
    fn new(entries: Table) -> Self {
        let min_len = entries.keys().map(String::len).min().unwrap_or(0);
        let max_len = entries.keys().map(String::len).max().unwrap_or(0);
        Self {
            entries,
            min_len,
            max_len,
        }
    }

    pub fn label(&self, code: &str) -> Option<&str> {
        self.entries.get(code).map(String::as_str)
    }

    pub fn min_len(&self) -> usize {
        self.min_len
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parameters accepted by a command
#[derive(Debug, Clone)]
pub enum ParameterTable {
    /// One table regardless of subcommand
    Flat(Table),
    /// A table per subcommand (Parameter Setting)
    PerSubcommand(BTreeMap<String, Table>),
}

impl ParameterTable {
    /// Label of a parameter code, resolved against the subcommand when the
    /// table is keyed by it
    pub fn label(&self, subcommand: Option<&str>, code: &str) -> Option<&str> {
        let label = match self {
            ParameterTable::Flat(params) => params.get(code),
            ParameterTable::PerSubcommand(by_sub) => by_sub.get(subcommand?)?.get(code),
        };
        label.map(String::as_str)
    }
}

/// Static description of one top-level command
#[derive(Debug, Clone)]
pub struct CommandDescriptor {
    pub code: String,
    pub label: String,
    pub subcommands: Option<SubcommandTable>,
    pub parameters: ParameterTable,
}

/// The immutable grammar registry
#[derive(Debug, Clone)]
pub struct Grammar {
    commands: BTreeMap<String, CommandDescriptor>,
    min_len: usize,
    max_len: usize,
    master_volume: ReverseIndex,
    status_requests: Table,
}

impl Grammar {
    /// Build the DN-500AV grammar, generated numeric series included
    pub fn dn500av() -> Self {
        let on_off = table(&[("ON", "On"), ("OFF", "Off")]);
        let up_down = table(&[("UP", "Up"), ("DOWN", "Down")]);

        let mut mv_params = with(up_down.clone(), volume::MASTER_VOLUME.series(volume::master_volume_label));
        for quirk in ["99", "995"] {
            if let Some(label) = volume::master_volume_label(quirk) {
                mv_params.insert(quirk.to_string(), label);
            }
        }
        let cv_params = with(
            up_down.clone(),
            volume::CHANNEL_VOLUME.series(volume::channel_volume_label),
        );
        let slp_params = with(table(&[("OFF", "Off")]), sleep_timer_series());

        let mut commands = BTreeMap::new();
        let mut add = |code: &str, label: &str, subcommands: Option<Table>, parameters: ParameterTable| {
            commands.insert(
                code.to_string(),
                CommandDescriptor {
                    code: code.to_string(),
                    label: label.to_string(),
                    subcommands: subcommands.map(SubcommandTable::new),
                    parameters,
                },
            );
        };

        add("PW", "Power", None, ParameterTable::Flat(table(&[("ON", "On"), ("STANDBY", "Standby")])));
        add(
            "MV",
            "Master Volume",
            Some(table(&[("MAX", "Maximum")])),
            ParameterTable::Flat(mv_params.clone()),
        );
        add(
            "CV",
            "Channel Volume",
            Some(table(&[
                ("FL", "Front Left"),
                ("FR", "Front Right"),
                ("C", "Center"),
                ("SW", "Subwoofer"),
                ("SL", "Surround Left"),
                ("SR", "Surround Right"),
                ("SBL", "Surround Back Left"),
                ("SBR", "Surround Back Right"),
                ("SB", "Surround Back"),
                ("FHL", "Front Height Left"),
                ("FHR", "Front Height Right"),
            ])),
            ParameterTable::Flat(cv_params.clone()),
        );
        add("MU", "Output Mute", None, ParameterTable::Flat(on_off.clone()));
        add("SI", "Select Input Source", None, ParameterTable::Flat(source_params()));
        add("ZM", "Main Zone", None, ParameterTable::Flat(on_off.clone()));
        add(
            "SD",
            "Digital Source Status",
            None,
            ParameterTable::Flat(table(&[
                ("AUTO", "Set AUTO mode"),
                ("HDMI", "Set force HDMI INPUT mode"),
                ("DIGITAL", "Set force DIGITAL INPUT (Optical, Coaxial) mode"),
                ("ANALOG", "Set force ANALOG INPUT mode"),
            ])),
        );
        add(
            "DC",
            "Digital Input Mode",
            None,
            ParameterTable::Flat(table(&[
                ("AUTO", "Set DIGITAL INPUT AUTO mode"),
                ("PCM", "Set DIGITAL INPUT force PCM mode"),
                ("DTS", "Set DIGITAL INPUT force DTS mode"),
            ])),
        );
        add(
            "SV",
            "Video Select Mode",
            None,
            ParameterTable::Flat(table(&[
                ("DVD", "DVD"),
                ("BD", "BD"),
                ("TV", "TV"),
                ("SAT/CBL", "SAT/CBL"),
                ("GAME", "GAME"),
                ("GAME2", "GAME 2"),
                ("DOCK", "DOCK"),
                ("V.AUX", "VIDEO AUX"),
                ("SOURCE", "Cancel (Source)"),
            ])),
        );
        add("SLP", "Main Zone Sleep Timer", None, ParameterTable::Flat(slp_params.clone()));
        add("MS", "Select Surround Mode", None, ParameterTable::Flat(surround_params()));
        add(
            "VS",
            "Select Video Mode",
            None,
            ParameterTable::Flat(table(&[
                ("AUDIO AMP", "Set HDMI AUDIO Output to AMP"),
                ("AUDIO TV", "Set HDMI AUDIO Output to TV"),
                ("VPMAUTO", "Set Video Processing Mode to AUTO"),
                ("VPMGAME", "Set Video Processing Mode to GAME"),
                ("VPMMOVIE", "Set Video Processing Mode to MOVIE"),
            ])),
        );
        add(
            "PS",
            "Parameter Setting",
            Some(table(&[
                ("TONE CTRL", "Tone Control"),
                ("SB:", "Surround Back Speaker Mode"),
                ("CINEMA EQ.", "Cinema EQ"),
                ("MODE:", "Mode"),
                ("FH", "Front Height (Dolby Pro Logic IIz Height) Output"),
                ("PHG", "Dolby Pro Logic IIz Height Gain"),
                ("BAS", "Bass"),
                ("TRE", "Treble"),
                ("DRC", "DRC"),
                ("DCO", "D.COMP"),
                ("LFE", "Low Frequency Effects"),
                ("EFF", "Effect Level"),
                ("DEL", "Delay"),
                ("AFD", "Auto Flag Detect Mode"),
                ("PAN", "Panorama"),
                ("DIM", "Dimension"),
                ("CEN", "Center Width"),
                ("CEI", "Center Image"),
                ("SWR", "Subwoofer"),
                ("RSZ", "Room Size"),
                ("DELAY", "Audio Delay"),
                ("RSTR", "Audio Restorer"),
            ])),
            ParameterTable::PerSubcommand(parameter_setting_params(&on_off, &up_down)),
        );
        add(
            "Z2",
            "Zone 2 Control",
            None,
            ParameterTable::Flat(table(&[
                ("CD", "CD"),
                ("DVD", "DVD"),
                ("BD", "BD"),
                ("SAT/CBL", "SAT/CBL"),
                ("DOCK", "DOCK"),
                ("V.AUX", "VIDEO AUX"),
                ("IPOD", "IPOD"),
                ("NET/USB", "NET/USB"),
                ("SERVER", "SERVER"),
                ("FAVORITES", "FAVORITES"),
                ("USB/IPOD", "USB/IPOD"),
            ])),
        );
        add("Z2MU", "Zone 2 Mute", None, ParameterTable::Flat(on_off.clone()));
        add("Z2CV", "Zone 2 Channel Volume", None, ParameterTable::Flat(cv_params));
        add("Z2SLP", "Zone 2 Sleep Timer", None, ParameterTable::Flat(slp_params));
        add("NS", "NET/USB Control", None, ParameterTable::Flat(net_usb_params()));
        add("IP", "DOCK Control", None, ParameterTable::Flat(dock_params()));
        add(
            "MN",
            "Menu Control",
            None,
            ParameterTable::Flat(table(&[
                ("CUP", "Cursor Up"),
                ("CDN", "Cursor Down"),
                ("CLT", "Cursor Left"),
                ("CRT", "Cursor Right"),
                ("ENT", "Enter"),
                ("RTN", "Return"),
                ("MEN ON", "GUI Menu On"),
                ("MEN OFF", "GUI Menu Off"),
                ("SRC ON", "GUI Source Select Menu On"),
                ("SRC OFF", "GUI Source Select Menu Off"),
            ])),
        );
        add(
            "SY",
            "System Control",
            None,
            ParameterTable::Flat(table(&[
                ("REMOTE LOCK ON", "Remote Lock On"),
                ("REMOTE LOCK OFF", "Remote Lock Off"),
                ("PANEL LOCK ON", "Panel Button (Except Master Volume) Control Lock On"),
                ("PANEL+V LOCK ON", "Panel Button & Master Volume Control Lock On"),
                ("PANEL LOCK OFF", "Panel Button & Master Volume Control Lock Off"),
            ])),
        );
        add("UG", "Upgrade", None, ParameterTable::Flat(table(&[("IDN", "ID Number for Upgrade")])));
        add(
            "RM",
            "Remote Maintenance",
            None,
            ParameterTable::Flat(table(&[
                ("STA", "Remote Maintenance Mode Start"),
                ("END", "Remote Maintenance Mode Stop"),
            ])),
        );
        add("SS", "System Settings", None, ParameterTable::Flat(system_settings_params()));

        let min_len = commands.keys().map(String::len).min().unwrap_or(0);
        let max_len = commands.keys().map(String::len).max().unwrap_or(0);

        Self {
            commands,
            min_len,
            max_len,
            master_volume: ReverseIndex::from_table(&mv_params),
            status_requests: status_requests(),
        }
    }

    pub fn command(&self, code: &str) -> Option<&CommandDescriptor> {
        self.commands.get(code)
    }

    pub fn commands(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.commands.values()
    }

    /// Shortest command code length
    pub fn min_command_len(&self) -> usize {
        self.min_len
    }

    /// Longest command code length
    pub fn max_command_len(&self) -> usize {
        self.max_len
    }

    /// Raw master volume code for a display label, `"Up"` or `"Down"`
    pub fn master_volume_code(&self, label: &str) -> Result<&str> {
        self.master_volume.raw_code(label)
    }

    /// Documented status request lines and what they report
    pub fn status_requests(&self) -> impl Iterator<Item = (&str, &str)> {
        self.status_requests.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn sleep_timer_series() -> Table {
    (1..=120)
        .map(|minutes| (format!("{minutes:03}"), format!("{minutes} minutes")))
        .collect()
}

fn decibel_series(max: u32) -> Table {
    (0..=max)
        .map(|db| (format!("{db:02}"), format!("{db}dB")))
        .collect()
}

fn source_params() -> Table {
    table(&[
        ("CD", "CD"),
        ("DVD", "DVD"),
        ("BD", "BD"),
        ("TV", "TV"),
        ("SAT/CBL", "SAT/CBL"),
        ("GAME", "GAME"),
        ("GAME2", "GAME 2"),
        ("DOCK", "DOCK"),
        ("V.AUX", "VIDEO AUX"),
        ("IPOD", "IPOD"),
        ("NET/USB", "NET/USB"),
        ("SERVER", "SERVER"),
        ("FAVORITES", "FAVORITES"),
        ("USB/IPOD", "USB/IPOD"),
        ("USB", "USB"),
        ("IPD", "IPD"),
    ])
}

fn surround_params() -> Table {
    table(&[
        ("MOVIE", "Movie"),
        ("MUSIC", "Music"),
        ("GAME", "Game"),
        ("DIRECT", "Direct"),
        ("PURE DIRECT", "Pure Direct"),
        ("STEREO", "Stereo"),
        ("STANDARD", "Standard"),
        ("DOLBY DIGITAL", "Dolby Digital"),
        ("DTS SURROUND", "DTS Surround"),
        ("MCH STEREO", "Multi-channel Stereo"),
        ("ROCK ARENA", "Rock Arena"),
        ("JAZZ CLUB", "Jazz Club"),
        ("CLASSIC CONCERT", "Classic Concert"),
        ("MONO MOVIE", "Mono Movie"),
        ("MATRIX", "Matrix"),
        ("VIDEO GAME", "Video Game"),
        ("VIRTUAL", "Virtual Surround"),
        ("QUICK1", "Quick Select 1 Mode"),
        ("QUICK2", "Quick Select 2 Mode"),
        ("QUICK3", "Quick Select 3 Mode"),
        ("QUICK4", "Quick Select 4 Mode"),
        ("QUICK1 MEMORY", "Quick Select 1 Mode Memory"),
        ("QUICK2 MEMORY", "Quick Select 2 Mode Memory"),
        ("QUICK3 MEMORY", "Quick Select 3 Mode Memory"),
        ("QUICK4 MEMORY", "Quick Select 4 Mode Memory"),
        // Sent by the device but missing from the manual
        ("MULTI CH IN", "Multiple Channels Input"),
        ("DTS HD MSTR", "DTS HD Master"),
        ("DTS96/24", "DTS 96/24"),
    ])
}

fn parameter_setting_params(on_off: &Table, up_down: &Table) -> BTreeMap<String, Table> {
    let low_mid_high = table(&[("LOW", "Low"), ("MID", "Mid"), ("HI", "High")]);
    let tone = volume::TONE.series(volume::tone_label);

    let mut params = BTreeMap::new();
    let mut add = |sub: &str, t: Table| {
        params.insert(sub.to_string(), t);
    };

    add("TONE CTRL", on_off.clone());
    add(
        "SB:",
        table(&[
            ("MTRX ON", "Matrix"),
            ("PLIIX CINEMA", "Dolby Pro Logic IIx Cinema"),
            ("PLIIX MUSIC", "Dolby Pro Logic IIx Music"),
            ("ON", "On"),
            ("OFF", "Off"),
        ]),
    );
    add("CINEMA EQ.", on_off.clone());
    add(
        "MODE:",
        table(&[
            ("MUSIC", "Music"),
            ("CINEMA", "Cinema"),
            ("GAME", "Game"),
            ("PRO LOGIC", "Dolby Pro Logic"),
        ]),
    );
    add("FH", on_off.clone());
    add("PHG", low_mid_high.clone());
    add("BAS", tone.clone());
    add("TRE", tone);
    add("DRC", with(table(&[("AUTO", "Auto"), ("OFF", "Off")]), low_mid_high.clone()));
    add("DCO", with(table(&[("OFF", "Off")]), low_mid_high));
    add(
        "LFE",
        with(up_down.clone(), volume::LFE.series(volume::lfe_label)),
    );
    add(
        "EFF",
        with(up_down.clone(), volume::EFFECT_LEVEL.series(volume::effect_level_label)),
    );
    add(
        "DEL",
        with(
            up_down.clone(),
            table(&[("000", "0ms"), ("060", "60ms"), ("070", "70ms"), ("300", "300ms")]),
        ),
    );
    add("AFD", on_off.clone());
    add("PAN", on_off.clone());
    add("DIM", with(up_down.clone(), decibel_series(6)));
    add("CEN", with(up_down.clone(), decibel_series(7)));
    add(
        "CEI",
        with(up_down.clone(), table(&[("00", "0.0dB"), ("99", "1.0dB")])),
    );
    add("SWR", on_off.clone());
    add(
        "RSZ",
        table(&[
            ("S", "Small"),
            ("MS", "Medium Small"),
            ("M", "Medium"),
            ("ML", "Medium Large"),
            ("L", "Large"),
        ]),
    );
    // Firmware always answers 000 here
    add(
        "DELAY",
        with(up_down.clone(), table(&[("000", "0ms"), ("200", "200ms")])),
    );
    add(
        "RSTR",
        table(&[
            ("OFF", "Off"),
            ("MODE1", "Mode 1"),
            ("MODE2", "Mode 2"),
            ("MODE3", "Mode 3"),
        ]),
    );

    params
}

fn net_usb_params() -> Table {
    table(&[
        ("90", "Cursor Up"),
        ("91", "Cursor Down"),
        ("92", "Cursor Left"),
        ("93", "Cursor Right"),
        ("94", "Enter (Play/Pause)"),
        ("9A", "Play"),
        ("9B", "Pause"),
        ("9C", "Stop"),
        ("9D", "Skip Plus"),
        ("9E", "Skip Minus"),
        ("9H", "Repeat One"),
        ("9I", "Repeat All"),
        ("9J", "Repeat Off"),
        ("9K", "Random On / Shuffle Songs"),
        ("9M", "Random Off / Shuffle Off"),
        ("9W", "Toggle Browse Mode/Remote Mode control"),
        ("9X", "Page Next"),
        ("9Y", "Page Previous"),
        ("H", "Net Audio Preset Name"),
        ("FV MEM", "Add Favorites Folder"),
        ("P1 MEM", "Favorites 1 Memory"),
        ("P2 MEM", "Favorites 2 Memory"),
        ("P3 MEM", "Favorites 3 Memory"),
    ])
}

fn dock_params() -> Table {
    table(&[
        ("90", "Cursor Up"),
        ("91", "Cursor Down"),
        ("92", "Cursor Left"),
        ("93", "Cursor Right"),
        ("94", "Enter (Play/Pause)"),
        ("9A", "Play/Pause"),
        ("9C", "Stop"),
        ("9D", "Skip Plus"),
        ("9E", "Skip Minus"),
        ("9F", "Manual Search Plus"),
        ("9G", "Manual Search Minus"),
        ("9H", "Repeat One"),
        ("9I", "Repeat All"),
        ("9J", "Repeat Off"),
        ("9K", "Shuffle Songs"),
        ("9L", "Shuffle Album"),
        ("9M", "Shuffle Off"),
        ("9N", "Menu"),
        ("9P", "Browse Mode"),
        ("9Q", "Remote Mode"),
        ("9X", "Page Next"),
        ("9Y", "Page Previous"),
    ])
}

fn system_settings_params() -> Table {
    // The ON/OFF labels of HOSALS and OSDSCR read inverted in the manual; kept as documented
    table(&[
        ("HOSALS ON", "Auto Lip Sync Disable"),
        ("HOSALS OFF", "Auto Lip Sync Enable"),
        ("OSDSCR ON", "Screen Saver Off"),
        ("OSDSCR OFF", "Screen Saver On"),
        ("VCTZMADIS ABS", "Volume Control Display Absolute"),
        ("VCTZMADIS REL", "Volume Control Display Relative"),
        ("VCTZMALIM OFF", "Volume Control limit Off"),
        ("VCTZMALIM 060", "Volume Control limit -20dB"),
        ("VCTZMALIM 070", "Volume Control limit -10dB"),
        ("VCTZMALIM 080", "Volume Control limit 0dB"),
        ("VCTZMAPON 50", "Volume Control Power On: -30dB"),
    ])
}

fn status_requests() -> Table {
    table(&[
        ("PW?", "Power Status"),
        ("MV?", "Master Volume"),
        ("CV?", "Channel Volume"),
        ("MU?", "Output Mute"),
        ("SI?", "Selected Input Source"),
        ("ZM?", "Main Zone"),
        ("SD?", "Digital Source Status"),
        ("DC?", "Digital Input Mode"),
        ("SV?", "Video Select Mode"),
        ("SLP?", "Main Zone Sleep Timer"),
        ("MS?", "Surround Mode"),
        ("MSQUICK ?", "Quick Select Mode"),
        ("VSAUDIO ?", "Select Video Mode Audio"),
        ("VSVPN ?", "Video Processing Mode"),
        ("PSTONE CTRL?", "Parameter Setting Tone Control"),
        ("PSSB: ?", "Parameter Setting Surround Back Speaker Mode"),
        ("PSCINEMA EQ. ?", "Parameter Setting Cinema EQ"),
        ("PSMODE: ?", "Parameter Setting Mode"),
        ("PSFH: ?", "Parameter Setting Mode Front Height (Dolby Pro Logic IIz) Output"),
        ("PSPHG ?", "Parameter Setting Dolby Pro Logic IIz Height Gain"),
        ("PSBAS ?", "Parameter Setting Bass"),
        ("PSTRE ?", "Parameter Setting Treble"),
        ("PSDRC ?", "Parameter Setting DRC"),
        ("PSDCO ?", "Parameter Setting D.Comp"),
        ("PSLFE ?", "Parameter Setting Low Frequency Effect"),
        ("PSEFF ?", "Parameter Setting Effect Level"),
        ("PSDEL ?", "Parameter Setting Delay"),
        ("PSAFD ?", "Parameter Setting Auto Flag Detect Mode"),
        ("PSPAN ?", "Parameter Setting Panorama"),
        ("PSDIM ?", "Parameter Setting Dimension"),
        ("PSCEN ?", "Parameter Setting Center Width"),
        ("PSCEI ?", "Parameter Setting Center Image"),
        ("PSSWR ?", "Parameter Setting Subwoofer"),
        ("PSRSZ ?", "Parameter Setting Room Size"),
        ("PSDELAY ?", "Parameter Setting Audio Delay"),
        ("PSRSTR ?", "Parameter Setting Audio Restorer"),
        ("Z2?", "Zone 2 Status"),
        ("Z2MU?", "Zone 2 Output Mute"),
        ("Z2QUICK ?", "Zone 2 Quick Select Memory"),
        ("Z2CV?", "Zone 2 Channel Volume"),
        ("Z2SLP?", "Zone 2 Sleep Timer"),
        ("NSA", "Onscreen Display Info List (ASCII mode)"),
        ("NSE", "Onscreen Display Info List (UTF-8 mode)"),
        ("RM?", "System Control Remote Status"),
        ("HOS ?", "System Control - HOS (HDMI Setup) Status"),
        ("OSD ?", "System Control - GUI Setting Status"),
    ])
}
