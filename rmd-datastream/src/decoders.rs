//! Builtin datastream decoders.
//!
//! Each decoder is declared once in the [`datastream_decoders!`] table:
//! struct, decode function, and registry entry all come from the same
//! declaration, so the field list in the source is the authoritative wire
//! layout. Field reads happen strictly in declaration order through a
//! [`FieldDriver`], which attaches the field name and a hex dump to any
//! failure. A field's expression may use fields declared above it by name,
//! which is how length- and presence-dependent layouts are expressed.
//!
//! Type hashes are the CRC-32 of the lowercase engine type name; the `v`
//! numbers are tag versions. Several types appear in more than one version
//! where the games shipped different layouts. Fields named `unk*` are
//! preserved byte-exact but have no known meaning.

use rmd_stream::ByteStream;

use crate::container::Container;
use crate::error::Result;
use crate::fields::{DecodeCtx, FieldDriver};
use crate::registry::{Registry, UnknownBinData};
use crate::types::{BoundBox, Rid};

/// Declares datastream decoder structs, their decode functions, the
/// [`Decoded`] enum, and the builtin registration table.
macro_rules! datastream_decoders {
    (
        $(
            $(#[$meta:meta])*
            $variant:ident = $name:literal, $hash:literal, $vrsn:literal {
                $( $field:ident : $ftype:ty = $bind:expr ),* $(,)?
            }
        )*
    ) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq)]
            pub struct $variant {
                $( pub $field: $ftype, )*
            }

            impl $variant {
                pub const NAME: &'static str = $name;
                pub const TYPE_HASH: u32 = $hash;
                pub const VERSION: u32 = $vrsn;

                pub fn decode(stream: &mut ByteStream, ctx: DecodeCtx) -> Result<Self> {
                    let mut driver = FieldDriver::new(stream, ctx, $name);
                    $( let $field: $ftype = driver.field(stringify!($field), $bind)?; )*
                    let _ = &mut driver;
                    Ok(Self { $( $field, )* })
                }
            }
        )*

        /// Decoded payload of a datastream container.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Decoded {
            $( $variant($variant), )*
            Unknown(UnknownBinData),
        }

        /// Load every builtin decoder into `registry`.
        pub(crate) fn register_builtin(registry: &mut Registry) -> Result<()> {
            $(
                registry.register($name, $hash, $vrsn, |stream, ctx| {
                    Ok(Decoded::$variant($variant::decode(stream, ctx)?))
                })?;
            )*
            Ok(())
        }
    };
}

/// Item of `content::EntityArchetype` lists; plain record, never framed on
/// its own.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityArchetypeItem {
    pub enabled: bool,
    pub type_crc: String,
    pub item: Container,
}

impl EntityArchetypeItem {
    pub fn decode(stream: &mut ByteStream, ctx: DecodeCtx) -> Result<Self> {
        let mut d = FieldDriver::new(stream, ctx, "EntityArchetypeItem");
        let enabled = d.field("enabled", FieldDriver::boolean)?;
        let type_crc = d.field("type_crc", FieldDriver::crc)?;
        let item = d.field("item", FieldDriver::dsc)?;
        Ok(Self {
            enabled,
            type_crc,
            item,
        })
    }
}

datastream_decoders! {
    ClothProfile = "physics::ClothProfile", 0x98DD1A29, 1 {
        gravity_multiplier: f32 = FieldDriver::f16,
        damping_multiplier: f32 = FieldDriver::f16,
        linear_inertia_scale_multiplier: f32 = FieldDriver::f16,
        angular_inertia_scale_multiplier: f32 = FieldDriver::f16,
    }

    DialogueVoiceProfile = "content::DialogueVoiceProfile", 0x58ED0605, 0 {
        unko: u32 = FieldDriver::u32,
        rid: Rid = FieldDriver::rid_long,
        rids: Vec<Rid> = |d| d.iter(None, FieldDriver::rid_long),
    }

    DialogueType = "content::DialogueType", 0x0534C4EC, 3 {
        urgency: u32 = FieldDriver::u32,
        default_delay: f32 = FieldDriver::f32,
        sound_event: String = FieldDriver::istr,
        dialogue_line: String = FieldDriver::istr,
        sound_fx_start: String = FieldDriver::istr,
        sound_fx_end: String = FieldDriver::istr,
        facial_anim_blend_time: f32 = FieldDriver::f32,
        prevents_save: bool = FieldDriver::boolean,
        force_subtitle: bool = FieldDriver::boolean,
        subtitle_range: f32 = FieldDriver::f32,
    }

    Resource = "r::Resource", 0xD0B4291C, 1 {}

    PageResourceHeader = "ui::PageResource::Header", 0x4EDAE845, 3 {
        pathname: String = FieldDriver::istr,
        resource: Container = FieldDriver::dsc,
        data_offset: u32 = FieldDriver::u32,
        unko1: Vec<Container> = |d| d.iter_dsc(None),
        data_size: u32 = FieldDriver::u32,
        unko2: Vec<Container> = |d| d.iter_dsc(None),
    }

    PageResource = "ui::PageResource", 0x70635A61, 7 {
        rsc: Container = FieldDriver::dsc,
        path: String = FieldDriver::istr,
        headers: Vec<Container> = |d| d.iter_dsc(None),
        data: String = FieldDriver::istr,
        i1: Vec<Container> = |d| d.iter_dsc(None),
        i2: Vec<Container> = |d| d.iter_dsc(None),
        i3: Vec<Container> = |d| d.iter_dsc(None),
        i4: Vec<Container> = |d| d.iter_dsc(None),
        i5: Vec<Container> = |d| d.iter_dsc(None),
        i6: Vec<Container> = |d| d.iter_dsc(None),
        i7: Vec<Container> = |d| d.iter_dsc(None),
    }

    TransformComponent = "content::TransformComponent", 0x3C0CC124, 2 {
        gencom: Container = FieldDriver::dsc,
        integer: u32 = FieldDriver::u32,
        floats: Vec<f32> = |d| d.iter(Some(10), FieldDriver::f32),
    }

    AudioControllerComponent = "content::AudioControllerComponent", 0x7BB800D1, 1 {
        gencom: Container = FieldDriver::dsc,
    }

    AudioAcousticsComponent = "content::AudioAcousticsComponent", 0xE2382732, 1 {
        gencom: Container = FieldDriver::dsc,
        bool1: bool = FieldDriver::boolean,
        bool2: bool = FieldDriver::boolean,
        floaty: f32 = FieldDriver::f32,
    }

    SoundComponent = "content::SoundComponent", 0xC88AB15A, 9 {
        gencom: Container = FieldDriver::dsc,
        booly: bool = FieldDriver::boolean,
        str1: String = FieldDriver::istr,
        str2: String = FieldDriver::istr,
        subitems: Vec<Container> = |d| d.iter_dsc(None),
        i1: u32 = FieldDriver::u32,
        i2: u32 = FieldDriver::u32,
        i3: u32 = FieldDriver::u32,
        i4: u32 = FieldDriver::u32,
        i5: u32 = FieldDriver::u32,
        bool1: bool = FieldDriver::boolean,
        bool2: bool = FieldDriver::boolean,
    }

    RigidBodyToWorldTransformComponent = "contentcore::RigidBodyToWorldTransformComponent", 0xBBBF773C, 0 {
        gencom: Container = FieldDriver::dsc,
    }

    EquippableComponent = "content::EquippableComponent", 0xBD31C385, 1 {
        gencom: Container = FieldDriver::dsc,
    }

    AnimationEventComponent = "content::AnimationEventComponent", 0x093897D6, 3 {
        gencom: Container = FieldDriver::dsc,
    }

    GameCursorInteractableComponent = "content::GameCursorInteractableComponent", 0xD37CCD24, 2 {
        gencom: Container = FieldDriver::dsc,
        b1: bool = FieldDriver::boolean,
        b2: bool = FieldDriver::boolean,
        b3: bool = FieldDriver::boolean,
    }

    EquippableAnimationIdComponent = "content::EquippableAnimationIDComponent", 0xD7AA7140, 1 {
        gencom: Container = FieldDriver::dsc,
        unko: u32 = FieldDriver::u32,
    }

    AttachmentSocketComponent = "content::AttachmentSocketComponent", 0x40AE554B, 4 {
        gencom: Container = FieldDriver::dsc,
        socket: String = FieldDriver::istr,
    }

    AnimationSlaveComponent = "content::AnimationSlaveComponent", 0x40AE554B, 7 {
        gencom: Container = FieldDriver::dsc,
        b1: bool = FieldDriver::boolean,
        b2: bool = FieldDriver::boolean,
        b3: bool = FieldDriver::boolean,
        name: String = FieldDriver::istr,
        unko: Vec<u8> = |d| d.bytes(4),
    }

    HolsterableComponent = "content::HolsterableComponent", 0x4798B260, 1 {
        gencom: Container = FieldDriver::dsc,
        b1: bool = FieldDriver::boolean,
        b2: bool = FieldDriver::boolean,
        b3: bool = FieldDriver::boolean,
        b4: bool = FieldDriver::boolean,
        b5: bool = FieldDriver::boolean,
        name: String = FieldDriver::istr,
        unko: Vec<u8> = |d| d.bytes(4),
    }

    SkeletonComponent = "content::SkeletonComponent", 0x46B56566, 5 {
        gencom: Container = FieldDriver::dsc,
        rsc_id: Container = FieldDriver::dsc,
    }

    AnimationGraphComponent = "content::AnimationGraphComponent", 0xEAFB8C39, 0 {
        gencom: Container = FieldDriver::dsc,
        unko: Container = FieldDriver::dsc,
    }

    CollisionResourceComponent = "content::CollisionResourceComponent", 0x345FA276, 4 {
        gencom: Container = FieldDriver::dsc,
        unko: Container = FieldDriver::dsc,
        unkoi: u32 = FieldDriver::u32,
    }

    GameRayCastDamageActionComponent = "content::GameRayCastDamageActionComponent", 0xF933DD32, 10 {
        gencom: Container = FieldDriver::dsc,
        unko1: Vec<u8> = |d| d.bytes(8),
        name: String = FieldDriver::istr,
        unko2: Vec<u8> = |d| d.bytes(4),
    }

    /// Found in the iter-lists of ui::PageMetadata::ResourceGroup.
    UnknownGroupRef1 = "UNKNOWN_1", 0x383FCF03, 1 {
        f1: u32 = FieldDriver::u32,
        v1: Container = FieldDriver::dsc,
        f2: u32 = FieldDriver::u32,
    }

    /// Found in the iter-lists of ui::PageMetadata::ResourceGroup.
    UnknownGroupRef2 = "UNKNOWN_2", 0xB6866F79, 1 {
        f1: u32 = FieldDriver::u32,
        v1: Container = FieldDriver::dsc,
        f2: u32 = FieldDriver::u32,
    }

    UnknownGroupRef3 = "UNKNOWN_3", 0x38ABEE66, 1 {
        f1: u32 = FieldDriver::u32,
        v1: Container = FieldDriver::dsc,
        f2: u32 = FieldDriver::u32,
    }

    ShapeInfo = "physics::CollisionPackageMetadata::ShapeInfo", 0xF6A9FDA3, 0 {
        name: String = FieldDriver::istr,
        physics_material_name: String = FieldDriver::istr,
        layer_name: String = FieldDriver::istr,
    }

    RigidBodyInfo = "physics::CollisionPackageMetadata::RigidBodyInfo", 0x396302B5, 2 {
        visibility_index: u32 = FieldDriver::u32,
        name: String = FieldDriver::istr,
        physics_material_name: String = FieldDriver::istr,
        layer_name: String = FieldDriver::istr,
        keyframeable: bool = FieldDriver::boolean,
        shape_infos: Vec<Container> = |d| d.iter_dsc(None),
    }

    MorphemePackMetadata = "physics::MorphemePackMetadata", 0x2C487205, 0 {
        strings: Vec<String> = |d| d.iter(None, FieldDriver::istr),
    }

    FileInfoMetadataV0 = "r::FileInfoMetadata", 0x95E8C0EF, 0 {
        filesize: u64 = FieldDriver::u64,
        checksum: String = FieldDriver::crc,
        flags: u32 = FieldDriver::u32,
    }

    FileInfoMetadataV1 = "r::FileInfoMetadata", 0x95E8C0EF, 1 {
        filesize: u32 = FieldDriver::u32,
        checksum: String = FieldDriver::crc,
        flags: u32 = FieldDriver::u32,
    }

    FileInfoMetadataContent = "content::FileInfoMetadata", 0xBB2F78AB, 0 {
        filesize: u32 = FieldDriver::u32,
        checksum: String = FieldDriver::crc,
        flags: u32 = FieldDriver::u32,
    }

    ResourceIdContent = "content::ResourceID", 0xB862238F, 1 {
        rid: Rid = FieldDriver::rid,
    }

    ResourceMetadataContent = "content::ResourceMetadata", 0x184CFA41, 1 {
        rid: Container = FieldDriver::dsc,
        resource_type: u32 = FieldDriver::u32,
    }

    ResourceMetadata = "r::ResourceMetadata", 0x368B4205, 3 {
        rids: Container = FieldDriver::dsc,
        dependencies: Vec<Container> = |d| d.iter_dsc(None),
    }

    EntityArchetype = "content::EntityArchetype", 0x6C5538CE, 3 {
        name: String = FieldDriver::istr,
        content: Container = FieldDriver::dsc,
        items_1: Vec<EntityArchetypeItem> = |d| d.iter(None, |d| d.subitem(EntityArchetypeItem::decode)),
        items_2: Vec<Container> = |d| d.iter_dsc(None),
    }

    ContentEntityBase = "r::ContentEntityBase", 0x64AE5E6B, 0 {
        i1: u32 = FieldDriver::u32,
        i2: u32 = FieldDriver::u32,
        i3: u32 = FieldDriver::u32,
    }

    NavmeshTemplateData = "coreshared::NavmeshTemplateData", 0x375596F6, 1 {
        ints: Vec<u32> = |d| d.iter(Some(8), FieldDriver::u32),
    }

    GenericEntity = "content::GenericEntity", 0x5150B030, 10 {
        subitem: Container = FieldDriver::dsc,
        floats: Vec<f32> = |d| d.iter(Some(12), FieldDriver::f32),
        string1: String = FieldDriver::istr,
        iter_rid: Vec<Rid> = |d| d.iter(None, FieldDriver::rid_long),
        booli: bool = FieldDriver::boolean,
    }

    FileMetadataEntryV1 = "FileMetadataEntry", 0x54034281, 1 {
        ofst: u32 = FieldDriver::u32,
        subitems: Vec<Container> = |d| d.iter_dsc(None),
    }

    FileMetadataEntryMetaV1 = "FileMetadataEntry::Metadata", 0xADC4584F, 1 {
        meta_index: u32 = FieldDriver::u32,
        file_index: u32 = FieldDriver::u32,
    }

    FileMetadataEntryV2 = "r::PackFileMetadataManager::FileMetadataEntry", 0xE974FDFF, 2 {
        ofst: u32 = FieldDriver::u32,
        subitems: Vec<Container> = |d| d.iter_dsc(None),
    }

    FileMetadataEntryMetaV2 = "r::PackFileMetadataManager::FileMetadataEntry::Metadata", 0x35AE54C1, 2 {
        meta_index: u32 = FieldDriver::u32,
        file_index: u32 = FieldDriver::u32,
    }

    ResourceId = "r::ResourceID", 0x1BFC72D5, 1 {
        rid: Rid = FieldDriver::rid_long,
    }

    MeshMetadataV21 = "rend::MeshMetadata", 0xFE276448, 21 {
        meshformat: Container = FieldDriver::dsc,
        missing_material_binds: bool = FieldDriver::boolean,
        has_bones: bool = FieldDriver::boolean,
        has_extra_material_binds: bool = FieldDriver::boolean,
        skeleton_rid: Container = FieldDriver::dsc,
        max_file_path: String = FieldDriver::istr,
        is_occluder: u8 = FieldDriver::u8,
        val_1: Vec<u8> = |d| d.bytes(4),
        lod_template_path: String = FieldDriver::istr,
        rbf_cutoff_lod: u32 = FieldDriver::u32,
        val_2: Vec<u8> = |d| d.bytes(4),
        f1: u32 = FieldDriver::u32,
        f2: u32 = FieldDriver::u32,
        f3: u32 = FieldDriver::u32,
        f4: u32 = FieldDriver::u32,
        rid_list: Vec<Container> = |d| d.iter_dsc(None),
    }

    MeshMetadataV15 = "rend::MeshMetadata", 0xFE276448, 15 {
        fmt: Container = FieldDriver::dsc,
        b1: bool = FieldDriver::boolean,
        b2: bool = FieldDriver::boolean,
        b3: bool = FieldDriver::boolean,
        rid1: Container = FieldDriver::dsc,
        rid2: Container = FieldDriver::dsc,
        str_1: String = FieldDriver::istr,
        num_1: u8 = FieldDriver::u8,
        val_1: Vec<u8> = |d| d.bytes(4),
        str_2: String = FieldDriver::istr,
        num_2: u32 = FieldDriver::u32,
        val_2: Vec<u8> = |d| d.bytes(4),
        f1: u32 = FieldDriver::u32,
    }

    MeshFormatContent = "content::MeshFormat", 0x858A1F4C, 2 {
        f1: u32 = FieldDriver::u32,
        f2: u32 = FieldDriver::u32,
        f3: u32 = FieldDriver::u32,
        boundbox: Container = FieldDriver::dsc,
    }

    MeshFormatRend = "rend::MeshFormat", 0xBF008D7D, 3 {
        f1: u32 = FieldDriver::u32,
        f2: u32 = FieldDriver::u32,
        f3: u32 = FieldDriver::u32,
        f4: u32 = FieldDriver::u32,
        f5: u32 = FieldDriver::u32,
        f6: u32 = FieldDriver::u32,
        f7: u32 = FieldDriver::u32,
        bbox: Container = FieldDriver::dsc,
    }

    ParticleSystemMetadataRendV4 = "rend::ParticleSystemMetadata", 0x32F0DE4B, 4 {
        f1: u32 = FieldDriver::u32,
    }

    ParticleSystemMetadataRendV6 = "rend::ParticleSystemMetadata", 0x32F0DE4B, 6 {
        f1: u32 = FieldDriver::u32,
        f2: u32 = FieldDriver::u32,
        f3: u32 = FieldDriver::u32,
    }

    PageMetadata = "ui::PageMetadata", 0x83E69A63, 3 {
        pages: Vec<String> = |d| d.iter(None, FieldDriver::istr),
        groups: Vec<Container> = |d| d.iter_dsc(None),
        unko1: u32 = FieldDriver::u32,
        unko2: bool = FieldDriver::boolean,
    }

    PhysXClothMetadata = "physics::PhysXClothMetadata", 0xCF1FBC60, 2 {
        unko1: Vec<Vec<u8>> = |d| d.iter(None, |d| d.bytes(12)),
        unko2: Vec<u32> = |d| d.iter(None, FieldDriver::u32),
    }

    SkeletonMetadataPuppet = "puppet::SkeletonMetadata", 0x338D8396, 2 {
        rids: Vec<Rid> = |d| d.iter(None, FieldDriver::rid),
    }

    TextureMetadataRendV1 = "rend::TextureMetadata", 0x968A49B7, 1 {
        desc: Container = FieldDriver::dsc,
        unkwn_end: Vec<u8> = |d| d.bytes(6),
    }

    TextureMetadataRendV5 = "rend::TextureMetadata", 0x968A49B7, 5 {
        desc: Container = FieldDriver::dsc,
        unkwn_end: Vec<u8> = |d| d.bytes(21),
    }

    CollisionPackageMetadataV10 = "physics::CollisionPackageMetadata", 0xCC074B60, 10 {
        iter1: Vec<Container> = |d| d.iter_dsc(None),
        iter2: Vec<Container> = |d| d.iter_dsc(None),
        end3: Vec<u8> = |d| d.bytes(3),
    }

    CollisionPackageMetadataV6 = "physics::CollisionPackageMetadata", 0xCC074B60, 6 {
        f1: u32 = FieldDriver::u32,
        bodies: Vec<Container> = |d| d.iter_dsc(None),
        end2: Vec<u8> = |d| d.bytes(2),
    }

    ResourceGroup = "ui::PageMetadata::ResourceGroup", 0x48BB28E2, 2 {
        name: String = FieldDriver::istr,
        unko_int1: u32 = FieldDriver::u32,
        unko_1: Vec<Container> = |d| d.iter_dsc(None),
        unko_2: Vec<Container> = |d| d.iter_dsc(None),
        unko_3: Vec<Container> = |d| d.iter_dsc(None),
    }

    TextureDescRendV4 = "rend::TextureDesc", 0x5AB63F81, 4 {
        kind: u32 = FieldDriver::u32,
        format: u32 = FieldDriver::u32,
        filter: u32 = FieldDriver::u32,
        width: u32 = FieldDriver::u32,
        height: u32 = FieldDriver::u32,
        depth: u32 = FieldDriver::u32,
        mipmap_count: u32 = FieldDriver::u32,
        mip_offsets: Vec<u64> = |d| d.iter(None, FieldDriver::u64),
        is_tiled: bool = FieldDriver::boolean,
        is_video_texture2: bool = FieldDriver::boolean,
    }

    TextureDescRendV5 = "rend::TextureDesc", 0x5AB63F81, 5 {
        kind: u32 = FieldDriver::u32,
        format: u32 = FieldDriver::u32,
        filter: u32 = FieldDriver::u32,
        width: u32 = FieldDriver::u32,
        height: u32 = FieldDriver::u32,
        depth: u32 = FieldDriver::u32,
        mipmap_count: u32 = FieldDriver::u32,
        mip_offsets: Vec<u64> = |d| d.iter(None, FieldDriver::u64),
        is_tiled: bool = FieldDriver::boolean,
        is_video_texture2: bool = FieldDriver::boolean,
        high_detail_stream_distance: u32 = FieldDriver::u32,
    }

    DialogueLine = "content::DialogueLine", 0x58FE2733, 18 {
        human_readable_id: String = FieldDriver::istr,
        dialogue_string: Rid = FieldDriver::rid_long,
        dialogue_type: Rid = FieldDriver::rid_long,
        delay: f32 = FieldDriver::f32,
        no_subtitles: bool = FieldDriver::boolean,
        is_generic_line: bool = FieldDriver::boolean,
        sound: Container = FieldDriver::dsc,
        animation_bundle: Container = FieldDriver::dsc,
        is_cinematic_line: bool = FieldDriver::boolean,
        xmd_offset: f32 = FieldDriver::f16,
        animation_offset: f32 = FieldDriver::f16,
        force_subtitles: bool = FieldDriver::boolean,
        duration: f32 = FieldDriver::f32,
    }

    DialogueStringV0 = "content::DialogueString", 0x4135DAB6, 0 {
        text: String = FieldDriver::istr,
        speaker: String = FieldDriver::istr,
    }

    DialogueStringV2 = "content::DialogueString", 0x4135DAB6, 2 {
        unknown: u32 = FieldDriver::u32,
        text: String = FieldDriver::istr,
        speaker: String = FieldDriver::istr,
    }

    TextureMetadataContent = "content::TextureMetadata", 0xD489B181, 0 {
        desc: Container = FieldDriver::dsc,
        high_detail_stream_distance: f32 = FieldDriver::f32,
        use_texture_lod: bool = FieldDriver::boolean,
    }

    HavokAnimationMetadata = "content::HavokAnimationMetadata", 0xFE16BFD8, 1 {
        animation_event_path: String = FieldDriver::istr,
        length: f32 = FieldDriver::f32,
    }

    MeshMetadataContent = "content::MeshMetadata", 0x267BAB18, 1 {
        format: Container = FieldDriver::dsc,
        has_bones: bool = FieldDriver::boolean,
        texture_resource_ids: Vec<Container> = |d| d.iter_dsc(None),
    }

    FoliageMeshMetadata = "content::FoliageMeshMetadata", 0x204283E3, 1 {
        format: Container = FieldDriver::dsc,
        texture_count: u32 = FieldDriver::u32,
        texture_resource_ids: Vec<Container> = |d| d.iter_dsc(None),
    }

    TextureDescContent = "content::TextureDesc", 0x0B52B529, 1 {
        kind: u32 = FieldDriver::u32,
        format: u32 = FieldDriver::u32,
        filter: u32 = FieldDriver::u32,
        width: u32 = FieldDriver::u32,
        height: u32 = FieldDriver::u32,
        depth: u32 = FieldDriver::u32,
        mipmap_count: u32 = FieldDriver::u32,
        mip_offsets: Vec<u32> = |d| d.iter(None, FieldDriver::u32),
    }

    ParticleSystemMetadataContent = "content::ParticleSystemMetadata", 0x763F3F31, 2 {
        rids: Vec<Container> = |d| d.iter_dsc(None),
        f2: u32 = FieldDriver::u32,
    }

    OspHackSimdTransform = "r::OSPHackSIMDTransform", 0x81296CA2, 1 {
        unknown: Vec<u32> = |d| d.iter(None, FieldDriver::u32),
    }

    RenderBones = "physics::CollisionPackageMetadata::RenderBones", 0x156AA42D, 1 {
        bones: Vec<u16> = |d| d.iter(None, FieldDriver::u16),
    }

    BoundBoxR = "r::BoundBox", 0xD8763D8B, 1 {
        bounds: BoundBox = FieldDriver::bound_box,
    }

    RuntimeVersion = "content::RuntimeVersion", 0xA750BFB5, 4 {}
    GfxGraphMetadata = "coreshared::GfxGraphMetadata", 0x97B97719, 1 {}
    ClothProfileMetadata = "physics::ClothProfileMetadata", 0x2555EDC9, 1 {}
    BehaviorTreeMetadata = "bonsai::BehaviorTreeMetadata", 0x792D12F4, 1 {}
    RbfMetadata = "physics::RBFMetadata", 0x30231D43, 0 {}
    DialogueMetadata = "snd::DialogueMetadata", 0x9F5DCB8E, 0 {}
    ExternalSourceMetadata = "snd::ExternalSourceMetadata", 0x414CDC22, 1 {}
    GenericComponent = "content::GenericComponent", 0x055F03B7, 5 {}
    DialogueStringTableMetadata = "snd::DialogueStringTableMetadata", 0x4977674C, 0 {}
    FlareMetadata = "rend::FlareMetadata", 0x04D1FCAE, 0 {}
    IlluminationVolumeGiDataMetadata = "rend::IlluminationVolumeGIDataMetadata", 0xB194D640, 0 {}
    IlluminationVolumeTreeMetadata = "rend::IlluminationVolumeTreeMetadata", 0xFD2565A2, 0 {}
    RagdollProfileMetadata = "physics::RagdollProfileMetadata", 0xCD632CB4, 1 {}
    BlendSpaceMetadata = "puppet::BlendSpaceMetadata", 0xFDC51EAA, 1 {}
    ClipMetadata = "puppet::ClipMetadata", 0x5215F16F, 1 {}
    MixerMetadata = "puppet::MixerMetadata", 0x191A97F6, 1 {}
    SystemicDialogueMetadata = "snd::SystemicDialogueMetadata", 0x2B9D7D52, 0 {}
    MotionDatabaseMetadata = "puppet::MotionDatabaseMetadata", 0x1B92F6C5, 1 {}
    EqsQueryMetadata = "bonsai::EQSQueryMetadata", 0x884E0523, 1 {}
    SdfVolumeMetadata = "rend::SDFVolumeMetadata", 0x53CD678D, 0 {}
    TimelineMetadata = "coregame::TimelineMetadata", 0x826DAE80, 0 {}
    SoundBankMetadata = "snd::SoundBankMetadata", 0xD084E551, 1 {}
    GraphMetadata = "puppet::GraphMetadata", 0x731DC02F, 1 {}
    BinaryBlobMetadata = "r::BinaryBlobMetadata", 0xAA33CC20, 0 {}
    DmmAnimationMetadata = "physics::DMMAnimationMetadata", 0xD7D8E623, 0 {}
    HavokClothMetadata = "physics::HavokClothMetadata", 0x02F5828F, 1 {}
    MorphemeMetadata = "physics::MorphemeMetadata", 0x97D14740, 6 {}
    SkeletonMetadataPhysics = "physics::SkeletonMetadata", 0x81BD379E, 0 {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::frame_v1;
    use pretty_assertions::assert_eq;

    fn lp(s: &str) -> Vec<u8> {
        let mut out = (s.len() as u32).to_le_bytes().to_vec();
        out.extend_from_slice(s.as_bytes());
        out
    }

    #[test]
    fn dialogue_type_decodes_in_declaration_order() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&2u32.to_le_bytes());
        payload.extend_from_slice(&1.5f32.to_le_bytes());
        payload.extend_from_slice(&lp("evt"));
        payload.extend_from_slice(&lp("line"));
        payload.extend_from_slice(&lp("fx_in"));
        payload.extend_from_slice(&lp("fx_out"));
        payload.extend_from_slice(&0.25f32.to_le_bytes());
        payload.push(1);
        payload.push(0);
        payload.extend_from_slice(&30.0f32.to_le_bytes());

        let mut stream = ByteStream::new(&payload);
        let decoded = DialogueType::decode(&mut stream, DecodeCtx::default()).unwrap();
        assert_eq!(decoded.urgency, 2);
        assert_eq!(decoded.sound_event, "evt");
        assert_eq!(decoded.dialogue_line, "line");
        assert!(decoded.prevents_save);
        assert!(!decoded.force_subtitle);
        assert_eq!(decoded.subtitle_range, 30.0);
        assert_eq!(stream.remaining(), 0);
    }

    #[test]
    fn cloth_profile_via_registry() {
        let registry = Registry::builtin().unwrap();
        // Four halfs: 1.0 1.0 0.5 2.0
        let payload = [0x00, 0x3C, 0x00, 0x3C, 0x00, 0x38, 0x00, 0x40];
        let framed = frame_v1(ClothProfile::TYPE_HASH, ClothProfile::VERSION, &payload);
        let mut stream = ByteStream::new(&framed);
        let container = Container::parse(&mut stream, &registry).unwrap();
        match *container.data {
            Decoded::ClothProfile(p) => {
                assert_eq!(p.gravity_multiplier, 1.0);
                assert_eq!(p.damping_multiplier, 1.0);
                assert_eq!(p.linear_inertia_scale_multiplier, 0.5);
                assert_eq!(p.angular_inertia_scale_multiplier, 2.0);
            }
            other => panic!("wrong decode: {other:?}"),
        }
    }

    #[test]
    fn nested_containers_recurse() {
        let registry = Registry::builtin().unwrap();
        // content::ResourceMetadata v1: inner ResourceID container + u32.
        let inner = frame_v1(ResourceIdContent::TYPE_HASH, 1, &[0xAA, 0xBB, 0xCC, 0xDD]);
        let mut payload = inner;
        payload.extend_from_slice(&7u32.to_le_bytes());
        let framed = frame_v1(ResourceMetadataContent::TYPE_HASH, 1, &payload);
        let mut stream = ByteStream::new(&framed);
        let container = Container::parse(&mut stream, &registry).unwrap();
        match *container.data {
            Decoded::ResourceMetadataContent(meta) => {
                assert_eq!(meta.resource_type, 7);
                match *meta.rid.data {
                    Decoded::ResourceIdContent(inner) => {
                        assert_eq!(inner.rid.to_string(), "DDCCBBAA");
                    }
                    other => panic!("wrong inner decode: {other:?}"),
                }
            }
            other => panic!("wrong decode: {other:?}"),
        }
    }

    #[test]
    fn file_metadata_entry_with_subitems() {
        let registry = Registry::builtin().unwrap();
        let mut meta_payload = Vec::new();
        meta_payload.extend_from_slice(&1u32.to_le_bytes());
        meta_payload.extend_from_slice(&4u32.to_le_bytes());
        let meta = frame_v1(FileMetadataEntryMetaV1::TYPE_HASH, 1, &meta_payload);

        let mut payload = Vec::new();
        payload.extend_from_slice(&0x100u32.to_le_bytes());
        payload.extend_from_slice(&1u32.to_le_bytes());
        payload.extend_from_slice(&meta);
        let framed = frame_v1(FileMetadataEntryV1::TYPE_HASH, 1, &payload);

        let mut stream = ByteStream::new(&framed);
        let container = Container::parse(&mut stream, &registry).unwrap();
        match *container.data {
            Decoded::FileMetadataEntryV1(entry) => {
                assert_eq!(entry.ofst, 0x100);
                assert_eq!(entry.subitems.len(), 1);
                match &*entry.subitems[0].data {
                    Decoded::FileMetadataEntryMetaV1(m) => {
                        assert_eq!(m.meta_index, 1);
                        assert_eq!(m.file_index, 4);
                    }
                    other => panic!("wrong subitem decode: {other:?}"),
                }
            }
            other => panic!("wrong decode: {other:?}"),
        }
    }

    #[test]
    fn field_failure_names_the_field() {
        let mut stream = ByteStream::new(&[1, 0, 0, 0]);
        let err = DialogueType::decode(&mut stream, DecodeCtx::default()).unwrap_err();
        match err {
            crate::error::DatastreamError::Field { decoder, field, .. } => {
                assert_eq!(decoder, "content::DialogueType");
                assert_eq!(field, "default_delay");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
