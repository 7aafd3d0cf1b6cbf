//! `Video` and `Texture` objects.

use base64::Engine;
use glam::Vec2;
use indexmap::IndexMap;
use kaydara_core::{Node, Property};
use log::{debug, warn};

use super::context::{attr_vec3, basename, extension, DecodeContext};
use crate::error::Result;
use crate::scene::{ImageSource, Texture, UnifiedScene, Wrap};

/// Resolve every `Video` object to an image source, keyed by video id.
///
/// Embedded content is shared between videos that reference the same file.
pub(crate) fn parse_images(ctx: &DecodeContext<'_>) -> Result<IndexMap<i64, ImageSource>> {
    let mut files: IndexMap<i64, String> = IndexMap::new();
    let mut blobs: IndexMap<String, ImageSource> = IndexMap::new();

    for video in ctx.tree.objects_of("Video") {
        let Some(id) = video.numeric_id() else {
            continue;
        };
        let filename = video
            .value_str("RelativeFilename")
            .filter(|s| !s.is_empty())
            .or_else(|| video.value_str("Filename"))
            .unwrap_or_default()
            .to_string();

        if let Some(content) = video.value("Content") {
            if !blobs.contains_key(&filename) {
                if let Some(image) = parse_image(ctx, content, &filename)? {
                    blobs.insert(filename.clone(), image);
                }
            }
        }
        files.insert(id, filename);
    }

    let images = files
        .into_iter()
        .map(|(id, filename)| {
            let source = match blobs.get(&filename) {
                Some(blob) => blob.clone(),
                None => ImageSource::External {
                    uri: basename(&filename).to_string(),
                },
            };
            (id, source)
        })
        .collect();
    Ok(images)
}

/// Decode embedded content. Returns `None` for empty or unsupported content.
fn parse_image(
    ctx: &DecodeContext<'_>,
    content: &Property,
    filename: &str,
) -> Result<Option<ImageSource>> {
    let data = match content {
        Property::Raw(bytes) => bytes.clone(),
        Property::String(text) => {
            let text: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            if text.is_empty() {
                return Ok(None);
            }
            base64::engine::general_purpose::STANDARD.decode(text)?
        }
        _ => return Ok(None),
    };
    if data.is_empty() {
        return Ok(None);
    }

    let ext = extension(filename).unwrap_or_default();
    let mime_type = match ext.as_str() {
        "bmp" => "image/bmp",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "tif" => "image/tiff",
        "tga" => {
            if !ctx.options.tga_supported {
                warn!("TGA decoder not available, {} may not load", filename);
            }
            "image/tga"
        }
        other => {
            warn!("Image type \"{}\" is not supported", other);
            return Ok(None);
        }
    };

    Ok(Some(ImageSource::Embedded {
        mime_type: mime_type.to_string(),
        data,
    }))
}

/// Build every `Texture` object and return texture id -> texture index.
pub(crate) fn parse_textures(
    ctx: &DecodeContext<'_>,
    images: &IndexMap<i64, ImageSource>,
    scene: &mut UnifiedScene,
) -> IndexMap<i64, usize> {
    let mut textures = IndexMap::new();
    for node in ctx.tree.objects_of("Texture") {
        let Some(id) = node.numeric_id() else {
            continue;
        };
        let texture = parse_texture(ctx, node, id, images);
        textures.insert(id, scene.add_texture(texture));
    }
    debug!("Parsed {} textures", textures.len());
    textures
}

fn parse_texture(
    ctx: &DecodeContext<'_>,
    node: &Node,
    id: i64,
    images: &IndexMap<i64, ImageSource>,
) -> Texture {
    let mut texture = Texture::new(node.attr_name.clone().unwrap_or_default(), load_source(ctx, node, id, images));
    texture.fbx_id = Some(id);

    let wrap = |name: &str| {
        node.attribute(name)
            .and_then(|a| a.as_i64())
            .map_or(Wrap::Repeat, Wrap::from_code)
    };
    texture.sampler.wrap_u = wrap("WrapModeU");
    texture.sampler.wrap_v = wrap("WrapModeV");

    if let Some(scale) = attr_vec3(node, "Scaling") {
        texture.repeat = Vec2::new(scale.x, scale.y);
    }
    if let Some(translation) = attr_vec3(node, "Translation") {
        texture.offset = Vec2::new(translation.x, translation.y);
    }

    texture
}

/// Pick the image of a texture; unsupported file types become placeholders.
fn load_source(
    ctx: &DecodeContext<'_>,
    node: &Node,
    id: i64,
    images: &IndexMap<i64, ImageSource>,
) -> ImageSource {
    let file_name = node.value_str("FileName").unwrap_or_default();
    let relative = node.value_str("RelativeFilename").unwrap_or(file_name);

    match extension(file_name).as_deref() {
        Some("tga") if !ctx.options.tga_supported => {
            warn!("TGA decoder not available, creating placeholder texture for {}", relative);
            return ImageSource::Placeholder;
        }
        Some("psd") => {
            warn!("PSD textures are not supported, creating placeholder texture for {}", relative);
            return ImageSource::Placeholder;
        }
        _ => {}
    }

    let image = ctx
        .children(id)
        .first()
        .and_then(|child| images.get(&child.id));
    match image {
        Some(image) => image.clone(),
        None if !file_name.is_empty() => ImageSource::External {
            uri: basename(file_name).to_string(),
        },
        None => ImageSource::Placeholder,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::fbx::test_util::parse_doc;
    use crate::registry::ReadOptions;
    use crate::error::IoError;

    const TEXTURED: &str = r#"Objects:  {
	Video: 200, "Video::wood", "Clip" {
		RelativeFilename: "maps\wood.png"
		Content: , "aGVsbG8="
	}
	Video: 201, "Video::stone", "Clip" {
		Filename: "C:\textures\stone.jpg"
	}
	Texture: 300, "Texture::wood", "" {
		FileName: "C:\textures\wood.png"
		Properties70:  {
			P: "WrapModeU", "enum", "", "",1
			P: "Scaling", "Vector", "", "A",2,3,1
		}
	}
	Texture: 301, "Texture::stone", "" {
		FileName: "C:\textures\stone.jpg"
	}
	Texture: 302, "Texture::layers", "" {
		FileName: "C:\textures\paint.psd"
	}
}
Connections:  {
	C: "OO",200,300
	C: "OO",201,301
	C: "OO",201,302
}
"#;

    fn decode(doc: &str, options: &ReadOptions) -> (UnifiedScene, IndexMap<i64, usize>) {
        let tree = parse_doc(doc);
        let ctx = DecodeContext::new(&tree, options);
        let images = parse_images(&ctx).unwrap();
        let mut scene = UnifiedScene::new();
        let map = parse_textures(&ctx, &images, &mut scene);
        (scene, map)
    }

    #[test]
    fn test_embedded_and_external_images() {
        let (scene, map) = decode(TEXTURED, &ReadOptions::default());
        let wood = &scene.textures[map[&300]];
        match &wood.source {
            ImageSource::Embedded { mime_type, data } => {
                assert_eq!(mime_type, "image/png");
                assert_eq!(data, b"hello");
            }
            other => panic!("Expected embedded image, got {:?}", other),
        }

        let stone = &scene.textures[map[&301]];
        match &stone.source {
            ImageSource::External { uri } => assert_eq!(uri, "stone.jpg"),
            other => panic!("Expected external image, got {:?}", other),
        }
    }

    #[test]
    fn test_sampler_and_scaling() {
        let (scene, map) = decode(TEXTURED, &ReadOptions::default());
        let wood = &scene.textures[map[&300]];
        assert_eq!(wood.sampler.wrap_u, Wrap::ClampToEdge);
        assert_eq!(wood.sampler.wrap_v, Wrap::Repeat);
        assert_eq!(wood.repeat, Vec2::new(2.0, 3.0));
        assert_eq!(wood.name, "wood");
    }

    #[test]
    fn test_psd_becomes_placeholder() {
        let (scene, map) = decode(TEXTURED, &ReadOptions::default());
        assert!(scene.textures[map[&302]].is_placeholder());
    }

    #[test]
    fn test_tga_depends_on_support() {
        let doc = r#"Objects:  {
	Texture: 310, "Texture::decal", "" {
		FileName: "decal.tga"
	}
}
"#;
        let (scene, map) = decode(doc, &ReadOptions::default());
        assert!(scene.textures[map[&310]].is_placeholder());

        let (scene, map) = decode(doc, &ReadOptions::default().with_tga_support(true));
        assert_eq!(
            scene.textures[map[&310]].source,
            ImageSource::External { uri: "decal.tga".into() }
        );
    }

    #[test]
    fn test_invalid_base64_is_fatal() {
        let doc = r#"Objects:  {
	Video: 200, "Video::bad", "Clip" {
		RelativeFilename: "bad.png"
		Content: , "@@@@"
	}
}
"#;
        let tree = parse_doc(doc);
        let options = ReadOptions::default();
        let ctx = DecodeContext::new(&tree, &options);
        assert!(matches!(parse_images(&ctx), Err(IoError::Base64(_))));
    }
}
