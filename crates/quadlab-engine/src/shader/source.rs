use std::io;
use std::path::Path;

/// Accumulation target while scanning a shader asset.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Section {
    /// Before the first marker; lines are discarded.
    None,
    Vertex,
    Fragment,
}

/// The two stage sources of a shader asset.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSources {
    /// Splits asset text into its stage sections.
    ///
    /// A line containing `#shader` switches to the vertex section if it also
    /// contains `vertex`, otherwise to the fragment section if it contains
    /// `fragment`; a marker naming neither keeps the current section. Every
    /// other line is copied verbatim, terminator included.
    pub fn parse(text: &str) -> Self {
        let mut sources = Self::default();
        let mut section = Section::None;

        for line in text.split_inclusive('\n') {
            if line.contains("#shader") {
                if line.contains("vertex") {
                    section = Section::Vertex;
                } else if line.contains("fragment") {
                    section = Section::Fragment;
                }
                continue;
            }

            let target = match section {
                Section::None => continue,
                Section::Vertex => &mut sources.vertex,
                Section::Fragment => &mut sources.fragment,
            };
            target.push_str(line);
            if !line.ends_with('\n') {
                target.push('\n');
            }
        }

        sources
    }

    /// Reads and splits the asset at `path`.
    pub fn read(path: impl AsRef<Path>) -> io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Like [`read`](Self::read), but a missing or unreadable file yields
    /// empty sources after logging the failure. The empty stages then fail
    /// to compile with a diagnostic of their own.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::read(path) {
            Ok(sources) => sources,
            Err(e) => {
                log::error!("failed to open '{}': {e}", path.display());
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    const ASSET: &str = "\
// preamble that belongs to no stage
#shader vertex
#version 450
layout(location = 0) in vec2 position;

void main() { gl_Position = vec4(position, 0.0, 1.0); }
#shader fragment
#version 450
layout(location = 0) out vec4 color;
void main() { color = vec4(1.0); }
";

    fn temp_asset(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "quadlab-{}-{name}.shader",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn sections_keep_lines_in_order() {
        let sources = ShaderSources::parse(ASSET);

        assert_eq!(
            sources.vertex,
            "#version 450\n\
             layout(location = 0) in vec2 position;\n\
             \n\
             void main() { gl_Position = vec4(position, 0.0, 1.0); }\n"
        );
        assert_eq!(
            sources.fragment,
            "#version 450\n\
             layout(location = 0) out vec4 color;\n\
             void main() { color = vec4(1.0); }\n"
        );
    }

    #[test]
    fn preamble_is_discarded() {
        let sources = ShaderSources::parse(ASSET);
        assert!(!sources.vertex.contains("preamble"));
        assert!(!sources.fragment.contains("preamble"));
    }

    #[test]
    fn vertex_only_asset_has_empty_fragment() {
        let sources = ShaderSources::parse("#shader vertex\nvoid main() {}\n");
        assert_eq!(sources.vertex, "void main() {}\n");
        assert_eq!(sources.fragment, "");
    }

    #[test]
    fn final_line_gets_a_terminator() {
        let sources = ShaderSources::parse("#shader fragment\nvoid main() {}");
        assert_eq!(sources.fragment, "void main() {}\n");
    }

    #[test]
    fn crlf_terminators_are_preserved() {
        let sources = ShaderSources::parse("#shader vertex\r\na\r\n#shader fragment\r\nb\r\n");
        assert_eq!(sources.vertex, "a\r\n");
        assert_eq!(sources.fragment, "b\r\n");
    }

    #[test]
    fn marker_without_stage_keeps_current_section() {
        let sources = ShaderSources::parse("#shader vertex\na\n#shader geometry\nb\n");
        assert_eq!(sources.vertex, "a\nb\n");
        assert_eq!(sources.fragment, "");
    }

    #[test]
    fn marker_may_appear_anywhere_on_the_line() {
        let sources = ShaderSources::parse("  // #shader   fragment stage\nx\n");
        assert_eq!(sources.fragment, "x\n");
    }

    #[test]
    fn repeated_marker_appends_to_the_same_section() {
        let sources =
            ShaderSources::parse("#shader vertex\na\n#shader fragment\nb\n#shader vertex\nc\n");
        assert_eq!(sources.vertex, "a\nc\n");
        assert_eq!(sources.fragment, "b\n");
    }

    #[test]
    fn read_and_load_agree_on_existing_file() {
        let path = temp_asset("read", ASSET);

        let read = ShaderSources::read(&path).unwrap();
        let loaded = ShaderSources::load(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(read, ShaderSources::parse(ASSET));
        assert_eq!(loaded, read);
    }

    #[test]
    fn missing_file_loads_as_empty_sources() {
        let path = std::env::temp_dir().join("quadlab-does-not-exist.shader");

        assert!(ShaderSources::read(&path).is_err());
        assert_eq!(ShaderSources::load(&path), ShaderSources::default());
    }
}
