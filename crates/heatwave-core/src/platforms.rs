use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone)]
pub struct PlatformDef {
    pub id: &'static str,
    pub display_name: &'static str,
    pub api_url: &'static str,
    pub token_url: &'static str,
}

macro_rules! define_platforms {
    ( $( $variant:ident = $index:expr => { id: $id:expr, display: $display:expr, api_url: $api:expr, token_url: $token:expr } ),+ $(,)? ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(usize)]
        pub enum Platform {
            $( $variant = $index ),+
        }

        impl Platform {
            pub const COUNT: usize = [ $( $index ),+ ].len();
            pub const ALL: [Platform; Self::COUNT] = [ $( Platform::$variant ),+ ];

            pub fn data(&self) -> &'static PlatformDef {
                &PLATFORMS[*self as usize]
            }

            pub fn as_str(&self) -> &'static str {
                self.data().id
            }

            pub fn display_name(&self) -> &'static str {
                self.data().display_name
            }

            pub fn iter() -> impl Iterator<Item = Platform> {
                Self::ALL.iter().copied()
            }

            #[allow(clippy::should_implement_trait)]
            pub fn from_str(s: &str) -> Option<Platform> {
                let s = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|p| p.as_str().eq_ignore_ascii_case(s))
            }
        }

        pub const PLATFORMS: [PlatformDef; Platform::COUNT] = [
            $( PlatformDef {
                id: $id,
                display_name: $display,
                api_url: $api,
                token_url: $token,
            } ),+
        ];

        const _: () = {
            let mut i = 0;
            $(
                assert!($index == i, "Platform indices must be sequential");
                i += 1;
                let _ = i;
            )+
        };
    };
}

define_platforms!(
    GitHub = 0 => {
        id: "github",
        display: "GitHub",
        api_url: "https://api.github.com",
        token_url: "https://github.com/login/oauth/access_token"
    },
    GitLab = 1 => {
        id: "gitlab",
        display: "GitLab",
        api_url: "https://gitlab.com/api/v4",
        token_url: "https://gitlab.com/oauth/token"
    }
);

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Platform {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Platform {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Platform::from_str(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown platform '{}'", s)))
    }
}
