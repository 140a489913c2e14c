use procguard_core::platform::Platform;

/// Desktop session helpers and per-user daemons that are not worth recording.
///
/// Several names are cut at 15 characters, the way the kernel reports them.
pub const DEFAULT_LINUX: &[&str] = &[
    "systemd",
    "(sd-pam)",
    "dbus-daemon",
    ".gcr-ssh-agent-",
    ".gnome-keyring-",
    ".gnome-session-",
    ".gnome-shell-wr",
    ".at-spi-bus-lau",
    "at-spi2-registryd",
    ".gnome-shell-ca",
    "dconf-service",
    ".evolution-sour",
    ".org.gnome.Shel",
    ".evolution-alar",
    ".org.gnome.Scre",
    ".goa-daemon-wra",
    ".goa-identity-s",
    ".evolution-cale",
    ".evolution-addr",
    "gsd-",
    "gvfsd-",
    "gvfs-",
    "gdm-",
    "xdg-",
    "fusermount3",
    ".mutter-x11-fra",
    ".localsearch-3-",
    "pipewire",
    "pipewire-pulse",
    "wireplumber",
    "speech-dispatcher",
    "Xwayland",
    "ssh-agent",
];

/// Session and shell hosts present in every Windows login.
pub const DEFAULT_WINDOWS: &[&str] = &[
    "System Idle Process",
    "System",
    "smss.exe",
    "lsass.exe",
    "StartMenuExperienceHost.exe",
    "SearchHost.exe",
    "RuntimeBroker.exe",
    "svchost.exe",
    "sihost.exe",
    "ShellHost.exe",
    "taskhostw.exe",
    "conhost.exe",
    "dllhost.exe",
    "LockApp.exe",
    "CHXSmartScreen.exe",
    "smartscreen.exe",
    "ipf_helper.exe",
    "TextInputHost.exe",
    "RtkUWP.exe",
    "RtkAudUService64.exe",
    "MoNotificationUx.exe",
    "ctfmon.exe",
    "nvcontainer.exe",
    "ShellExperienceHost.exe",
    "audiodg.exe",
    "ApplicationFrameHost.exe",
    "backgroundTaskHost.exe",
    "SystemSettings.exe",
    "wininit.exe",
    "fontdrvhost.exe",
    "dwm.exe",
    "spoolsv.exe",
    "services.exe",
];

/// Names excluded from tracking.
///
/// An entry ending in `-` is a prefix: it matches any name starting with the
/// entry minus the dash, also after stripping the leading `.` some desktop
/// wrappers carry. Other entries must equal the name exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreList {
    entries: Vec<String>,
}

impl IgnoreList {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    /// The default list of `platform`, empty where there is none.
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Linux => Self::new(DEFAULT_LINUX.iter().copied()),
            Platform::Windows => Self::new(DEFAULT_WINDOWS.iter().copied()),
            Platform::MacOs | Platform::Other => Self::default(),
        }
    }

    pub fn extend<I, S>(&mut self, extra: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.extend(extra.into_iter().map(Into::into));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        let undotted = name.strip_prefix('.').unwrap_or(name);
        self.entries.iter().any(|entry| match entry.strip_suffix('-') {
            Some(prefix) => name.starts_with(prefix) || undotted.starts_with(prefix),
            None => name == entry,
        })
    }
}
