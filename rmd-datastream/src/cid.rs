//! CID bins: flat batches of engine objects.
//!
//! A CID bin names its element type out-of-band (the file name's stem, e.g.
//! `cid_weapon.bin` holds `weapon` records). The header says how many
//! elements follow; peeking the first four body bytes tells the form apart:
//! a container tag means the elements are framed datastreams, anything else
//! is the simple fixed-record form dispatched by `(type name, version)`.

use tracing::{debug, warn};

use rmd_stream::{ByteStream, StreamError, Whence};

use crate::container::{Container, ContainerKind};
use crate::dp::DpFile;
use crate::error::{DatastreamError, Result};
use crate::fields::DecodeCtx;
use crate::objects::*;
use crate::registry::Registry;
use crate::types::{BoundBox, Rid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CidForm {
    Simple,
    Structured,
    StructuredV2,
}

/// Header and body of one CID bin.
pub struct CidBin {
    pub name: String,
    pub version: u32,
    pub content_type: u32,
    pub num_elements: u32,
    /// Header word with no known meaning, preserved verbatim.
    pub unknown: [u8; 4],
    pub form: CidForm,
    data: Vec<u8>,
}

/// Fixed byte offset where CID elements start.
const CID_BODY: usize = 16;

impl CidBin {
    pub fn parse(name: &str, data: &[u8]) -> Result<CidBin> {
        if data.len() < CID_BODY {
            return Err(DatastreamError::Malformed {
                what: "CID bin",
                reason: format!("{} bytes is shorter than the header", data.len()),
            });
        }
        let mut stream = ByteStream::new(data);
        let version = stream.u32()?;
        let content_type = stream.u32()?;
        let num_elements = stream.u32()?;
        let unknown = stream.read_array::<4>()?;

        let form = if num_elements != 0 {
            match Container::peek_kind(&stream) {
                Some(ContainerKind::V1) => CidForm::Structured,
                Some(ContainerKind::V2) => CidForm::StructuredV2,
                None => CidForm::Simple,
            }
        } else {
            CidForm::Simple
        };

        Ok(CidBin {
            name: name.to_owned(),
            version,
            content_type,
            num_elements,
            unknown,
            form,
            data: data.to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Element type derived from the file name: `cid_weapon.bin` -> `weapon`.
    pub fn type_stem(&self) -> &str {
        let stem = self.name.strip_suffix(".bin").unwrap_or(&self.name);
        stem.strip_prefix("cid_").unwrap_or(stem)
    }

    /// `(size - header) / count` when it divides evenly. Used to slice
    /// unrecognized elements.
    pub fn estimated_element_size(&self) -> Option<usize> {
        if self.num_elements == 0 {
            return None;
        }
        let body = self.data.len() - CID_BODY;
        (body % self.num_elements as usize == 0).then(|| body / self.num_elements as usize)
    }

    /// Decode the simple form. Unrecognized types and partially-decoded
    /// elements come back as [`SimpleObject::Unknown`] when the element size
    /// can be estimated; otherwise decoding stops at the failure.
    pub fn simple_objects(&self, dp: Option<&DpFile>) -> Vec<SimpleObject> {
        let mut stream = ByteStream::new(&self.data);
        if stream.seek(CID_BODY as i64, Whence::Start).is_err() {
            return Vec::new();
        }
        let ctx = DecodeCtx::with_dp(dp);
        let type_stem = self.type_stem().to_ascii_lowercase();
        let ees = self.estimated_element_size();

        let mut out = Vec::with_capacity(self.num_elements as usize);
        for index in 0..self.num_elements {
            let element_start = stream.tell();
            match read_object(&mut stream, &type_stem, self.version, ctx) {
                Ok(Some(object)) => out.push(object),
                Ok(None) => {
                    // Unaccounted type: slice by the estimated size or stop.
                    let Some(size) = ees else { break };
                    if stream.seek(element_start as i64, Whence::Start).is_err() {
                        break;
                    }
                    match stream.read_vec(size) {
                        Ok(data) => out.push(SimpleObject::Unknown(UnknownObject {
                            type_name: type_stem.clone(),
                            version: self.version,
                            data,
                        })),
                        Err(_) => break,
                    }
                }
                Err(DatastreamError::Stream(StreamError::OutOfBounds { .. })) => {
                    debug!(
                        bin = self.name,
                        element = index,
                        total = self.num_elements,
                        "CID element ran out of bytes"
                    );
                    break;
                }
                Err(err) => {
                    debug!(bin = self.name, element = index, %err, "CID element failed to decode");
                    let Some(size) = ees else { break };
                    if stream.seek((element_start + size) as i64, Whence::Start).is_err() {
                        break;
                    }
                    out.push(SimpleObject::Unknown(UnknownObject {
                        type_name: type_stem.clone(),
                        version: self.version,
                        data: self.data[element_start..element_start + size].to_vec(),
                    }));
                }
            }
        }
        out
    }

    /// Decode the structured forms: each element is a framed container.
    pub fn structured_objects(&self, registry: &Registry) -> Result<Vec<Container>> {
        let mut stream = ByteStream::new(&self.data);
        stream.seek(CID_BODY as i64, Whence::Start)?;
        let mut out = Vec::with_capacity(self.num_elements as usize);
        for _ in 0..self.num_elements {
            out.push(Container::parse(&mut stream, registry)?);
        }
        Ok(out)
    }
}

/// Raw element of a recognized fixed-size record type whose interior layout
/// is not known.
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueRecord {
    pub type_name: String,
    pub version: u32,
    pub data: Vec<u8>,
}

/// Element whose `(type, version)` pair is not in the dispatch table, or
/// which failed to decode.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownObject {
    pub type_name: String,
    pub version: u32,
    pub data: Vec<u8>,
}

/// One decoded simple-form element.
#[derive(Debug, Clone, PartialEq)]
pub enum SimpleObject {
    Rid(Rid),
    BoundBox(BoundBox),
    TaskContent(TaskContent),
    AmbientLightInstance(AmbientLightInstance),
    AnimationParameters(AnimationParameters),
    Script(Script),
    ScriptVariablesV1(ScriptVariablesV1),
    ScriptVariablesV2(ScriptVariablesV2),
    DynamicObjectScriptV3(DynamicObjectScriptV3),
    CharacterScriptV3(CharacterScriptV3),
    FloatingScriptV2(FloatingScriptV2),
    ScriptInstanceV1(ScriptInstanceV1),
    GameEventV5(GameEventV5),
    KeyFrameAnimationV5(KeyFrameAnimationV5),
    KeyFramerV3(KeyFramerV3),
    KeyFrameV1(KeyFrameV1),
    KeyFramedObjectV4(KeyFramedObjectV4),
    KeyFramedObjectV5(KeyFramedObjectV5),
    NotebookPageV2(NotebookPageV2),
    CharacterClassV38(CharacterClassV38),
    CharacterClassV42(CharacterClassV42),
    TriggerV18(TriggerV18),
    TriggerV20(TriggerV20),
    SkeletonV25(SkeletonV25),
    SkeletonSetupV1(SkeletonSetupV1),
    AreaTriggerV3(AreaTriggerV3),
    AnimationV17(AnimationV17),
    AnimationV19(AnimationV19),
    WeaponV33(WeaponV33),
    WeaponV39(WeaponV39),
    DynamicObjectV11(DynamicObjectV11),
    DynamicObjectV13(DynamicObjectV13),
    TaskDefinitionV11(TaskDefinitionV11),
    TaskDefinitionV15(TaskDefinitionV15),
    AttachmentContainerV7(AttachmentContainerV7),
    PhysicsMaterialV2(PhysicsMaterialV2),
    WaypointV1(WaypointV1),
    SpotLightV20(SpotLightV20),
    StaticObjectV10(StaticObjectV10),
    SoundV21(SoundV21),
    CellInfoV1(CellInfoV1),
    CharacterV13(CharacterV13),
    CharacterV17(CharacterV17),
    PointLightV11(PointLightV11),
    PointLightV13(PointLightV13),
    TextureMetadata(TextureMetadataRecV1),
    FileInfoMetadata(FileInfoMetadataRecV1),
    HavokAnimationMetadata(HavokAnimationMetadataRecV1),
    ParticleSystemMetadata(ParticleSystemMetadataRecV1),
    MeshMetadata(MeshMetadataRecV1),
    FoliageMeshMetadata(FoliageMeshMetadataRecV1),
    Opaque(OpaqueRecord),
    Unknown(UnknownObject),
}

/// Record types whose names end in `script` but share the common Script
/// shape.
const SCRIPT_ALIASES: &[&str] = &[
    "script",
    "spotlightscript",
    "particlesystemscript",
    "soundscript",
    "spybirdscript",
    "scriptinstancescript",
    "ambientlightscript",
    "pointlightscript",
    "tornadoscript",
    "triggerscript",
    "areatriggerscript",
    "taskscript",
    "waypointscript",
    "keyframerscript",
    "keyframedobjectscript",
    "spawnpositionscript",
    "itemscript",
    "portalscript",
    "simulatedsoundscript",
];

/// Recognized fixed-size record types with unexplored interiors.
fn opaque_size(type_name: &str, version: u32) -> Option<usize> {
    let size = match (type_name, version) {
        ("attachmentresources", 3) => 24,
        ("particlekillbox", 2) => 64,
        ("particlesystem", 3) => 61,
        ("persistentresource", 1) => 4,
        ("portal", 2) => 28,
        ("radioshow", 2) => 28,
        ("reststop", 1) => 28,
        ("reverbpreset", 1) => 72,
        ("room", 4) => 32,
        ("simulatedsound", 5) => 32,
        ("simulatedsoundcontent", 6) => 29,
        ("simulatedsoundcontrol", 3) => 16,
        ("simulatedsoundinstance", 4) => 69,
        ("skinitem", 1) => 36,
        ("soundinstance", 5) => 69,
        ("soundpreset", 2) => 28,
        ("spawnpoint", 6) => 96,
        ("spawnpointscript", 3) => 48,
        ("spawnposition", 1) => 56,
        ("springbone", 3) => 36,
        ("spybird", 2) => 76,
        ("thresholdevent", 1) => 8,
        ("throwable", 6) => 49,
        ("throwableitem", 3) => 86,
        ("tornado", 1) => 64,
        ("vehicle", 5) => 100,
        ("vehiclescript", 3) => 48,
        ("vehiclesound", 10) => 72,
        ("volume", 1) => 68,
        ("weaponitem", 3) => 86,
        ("ammoitem", 3) => 86,
        ("ammo", 4) => 56,
        ("animationattimehandler", 1) => 8,
        ("battery", 3 | 4) => 36,
        ("batteryitem", 3) => 86,
        ("birdswarm", 1) => 76,
        ("blocker", 2) => 84,
        ("camerapath", 2) => 13,
        ("cameraset", 7) => 84,
        ("cinematic", 5) => 112,
        ("cinematicline", 2) => 26,
        ("collectible", 2) => 33,
        ("constraintbone", 3) => 72,
        ("dbdecal", 1) => 36,
        ("dbparticlesystem", 1) => 12,
        ("debugentity", 1) => 56,
        ("dialogueline", 4) => 35,
        ("interiordefinition", 4) => 56,
        ("loadingscreenhint", 1) => 20,
        ("matdependentsimsound", 1) => 12,
        ("lightsourceitem", 3) => 86,
        ("lightsource", 10) => 186,
        ("gameeventhandler", 1) => 8,
        ("effect", 3) => 32,
        ("ambientlight", 2) => 41,
        ("globalversion", 156) => 4,
        ("vehiclepreset", 30) => 627,
        ("hudguidancelayout", 3) => 859,
        ("lensflare", 7) => 489,
        _ => return None,
    };
    Some(size)
}

/// Dispatch one simple-form element by `(type name, version)`. `Ok(None)`
/// means the pair is not in the table.
pub fn read_object(
    stream: &mut ByteStream,
    type_name: &str,
    version: u32,
    ctx: DecodeCtx,
) -> Result<Option<SimpleObject>> {
    // Version-independent types first.
    match type_name {
        "rid" => return Ok(Some(SimpleObject::Rid(Rid::read(stream)?))),
        "aabb" => return Ok(Some(SimpleObject::BoundBox(BoundBox::read(stream)?))),
        "taskcontent" => {
            return Ok(Some(SimpleObject::TaskContent(TaskContent::read(
                stream, ctx,
            )?)));
        }
        "ambientlightinstance" => {
            return Ok(Some(SimpleObject::AmbientLightInstance(
                AmbientLightInstance::read(stream, ctx)?,
            )));
        }
        "animationparameters" => {
            return Ok(Some(SimpleObject::AnimationParameters(
                AnimationParameters::read(stream, ctx)?,
            )));
        }
        name if SCRIPT_ALIASES.contains(&name) => {
            return Ok(Some(SimpleObject::Script(Script::read(stream, ctx)?)));
        }
        _ => {}
    }

    let object = match (type_name, version) {
        ("attachmentcontainer", 7) => {
            SimpleObject::AttachmentContainerV7(AttachmentContainerV7::read(stream, ctx)?)
        }
        ("gameevent", 5) => SimpleObject::GameEventV5(GameEventV5::read(stream, ctx)?),
        ("keyframeanimation", 5) => {
            SimpleObject::KeyFrameAnimationV5(KeyFrameAnimationV5::read(stream, ctx)?)
        }
        ("keyframer", 3) => SimpleObject::KeyFramerV3(KeyFramerV3::read(stream, ctx)?),
        ("notebookpage", 2) => SimpleObject::NotebookPageV2(NotebookPageV2::read(stream, ctx)?),
        ("characterclass", 38) => {
            SimpleObject::CharacterClassV38(CharacterClassV38::read(stream, ctx)?)
        }
        ("characterclass", 42) => {
            SimpleObject::CharacterClassV42(CharacterClassV42::read(stream, ctx)?)
        }
        ("keyframedobject", 4) => {
            SimpleObject::KeyFramedObjectV4(KeyFramedObjectV4::read(stream, ctx)?)
        }
        ("keyframedobject", 5) => {
            SimpleObject::KeyFramedObjectV5(KeyFramedObjectV5::read(stream, ctx)?)
        }
        ("trigger", 18) => SimpleObject::TriggerV18(TriggerV18::read(stream, ctx)?),
        ("trigger", 20) => SimpleObject::TriggerV20(TriggerV20::read(stream, ctx)?),
        ("skeleton", 25) => SimpleObject::SkeletonV25(SkeletonV25::read(stream, ctx)?),
        ("skeletonsetup", 1) => SimpleObject::SkeletonSetupV1(SkeletonSetupV1::read(stream, ctx)?),
        ("areatrigger", 3) => SimpleObject::AreaTriggerV3(AreaTriggerV3::read(stream, ctx)?),
        ("animation", 17) => SimpleObject::AnimationV17(AnimationV17::read(stream, ctx)?),
        ("animation", 19) => SimpleObject::AnimationV19(AnimationV19::read(stream, ctx)?),
        ("weapon", 33) => SimpleObject::WeaponV33(WeaponV33::read(stream, ctx)?),
        ("weapon", 39) => SimpleObject::WeaponV39(WeaponV39::read(stream, ctx)?),
        ("dynamicobject", 11) => {
            SimpleObject::DynamicObjectV11(DynamicObjectV11::read(stream, ctx)?)
        }
        ("dynamicobject", 13) => {
            SimpleObject::DynamicObjectV13(DynamicObjectV13::read(stream, ctx)?)
        }
        ("taskdefinition", 11) => {
            SimpleObject::TaskDefinitionV11(TaskDefinitionV11::read(stream, ctx)?)
        }
        ("taskdefinition", 15) => {
            SimpleObject::TaskDefinitionV15(TaskDefinitionV15::read(stream, ctx)?)
        }

        ("meshmetadata", 1) => SimpleObject::MeshMetadata(MeshMetadataRecV1::read(stream, ctx)?),
        ("texturemetadata", 1) => {
            SimpleObject::TextureMetadata(TextureMetadataRecV1::read(stream, ctx)?)
        }
        ("fileinfometadata", 1) => {
            SimpleObject::FileInfoMetadata(FileInfoMetadataRecV1::read(stream, ctx)?)
        }
        ("foliagemeshmetadata", 1) => {
            SimpleObject::FoliageMeshMetadata(FoliageMeshMetadataRecV1::read(stream, ctx)?)
        }
        ("particlesystemmetadata", 1) => {
            SimpleObject::ParticleSystemMetadata(ParticleSystemMetadataRecV1::read(stream, ctx)?)
        }
        ("havokanimationmetadata", 1) => {
            SimpleObject::HavokAnimationMetadata(HavokAnimationMetadataRecV1::read(stream, ctx)?)
        }

        ("dynamicobjectscript", 3) => {
            SimpleObject::DynamicObjectScriptV3(DynamicObjectScriptV3::read(stream, ctx)?)
        }
        ("characterscript", 3) => {
            SimpleObject::CharacterScriptV3(CharacterScriptV3::read(stream, ctx)?)
        }
        ("scriptinstance", 1) => {
            SimpleObject::ScriptInstanceV1(ScriptInstanceV1::read(stream, ctx)?)
        }
        ("waypoint", 1) => SimpleObject::WaypointV1(WaypointV1::read(stream, ctx)?),
        ("spotlight", 20) => SimpleObject::SpotLightV20(SpotLightV20::read(stream, ctx)?),
        ("physicsmaterial", 2) => {
            SimpleObject::PhysicsMaterialV2(PhysicsMaterialV2::read(stream, ctx)?)
        }
        ("scriptvariables", 1) => {
            SimpleObject::ScriptVariablesV1(ScriptVariablesV1::read(stream, ctx)?)
        }
        ("scriptvariables", 2) => {
            SimpleObject::ScriptVariablesV2(ScriptVariablesV2::read(stream, ctx)?)
        }
        ("floatingscript", 2) => {
            SimpleObject::FloatingScriptV2(FloatingScriptV2::read(stream, ctx)?)
        }
        ("keyframe", 1) => SimpleObject::KeyFrameV1(KeyFrameV1::read(stream, ctx)?),
        ("staticobject", 10) => SimpleObject::StaticObjectV10(StaticObjectV10::read(stream, ctx)?),
        ("sound", 21) => SimpleObject::SoundV21(SoundV21::read(stream, ctx)?),
        ("cellinfo", 1) => SimpleObject::CellInfoV1(CellInfoV1::read(stream, ctx)?),
        ("character", 13) => SimpleObject::CharacterV13(CharacterV13::read(stream, ctx)?),
        ("character", 17) => SimpleObject::CharacterV17(CharacterV17::read(stream, ctx)?),
        ("pointlight", 11) => SimpleObject::PointLightV11(PointLightV11::read(stream, ctx)?),
        ("pointlight", 13) => SimpleObject::PointLightV13(PointLightV13::read(stream, ctx)?),

        (name, version) => {
            if let Some(size) = opaque_size(name, version) {
                SimpleObject::Opaque(OpaqueRecord {
                    type_name: name.to_owned(),
                    version,
                    data: stream.read_vec(size)?,
                })
            } else {
                warn!(name, version, "unaccounted CID object type");
                return Ok(None);
            }
        }
    };
    Ok(Some(object))
}
