//! Ready-made step lists for the flows the front end offers.

use crate::artifact::{ArtifactId, ArtifactKind, LocalFile};
use crate::transfer::{ComposeOptions, ComposeRequest, RemoteSource};
use super::job::StepSpec;

/// Upload a local video, then extract its audio.
pub fn extract_from_file(file: LocalFile) -> Vec<StepSpec> {
    vec![
        StepSpec::Upload {
            file,
            expected: ArtifactKind::Video,
        },
        StepSpec::ExtractAudio { source: None },
    ]
}

/// Have the service fetch a remote video, then extract its audio.
pub fn remote_to_audio(url: impl Into<String>, source: RemoteSource) -> Vec<StepSpec> {
    vec![
        StepSpec::FetchRemote {
            url: url.into(),
            source,
        },
        StepSpec::ExtractAudio { source: None },
    ]
}

/// Upload a single file into a slot that takes `expected` files only.
pub fn upload_only(file: LocalFile, expected: ArtifactKind) -> Vec<StepSpec> {
    vec![StepSpec::Upload { file, expected }]
}

/// Compose a short from already-uploaded images and audio.
pub fn compose_short(images: Vec<ArtifactId>, audio: ArtifactId, options: ComposeOptions) -> Vec<StepSpec> {
    vec![StepSpec::Compose(ComposeRequest {
        image_ids: images,
        audio_id: audio,
        options,
    })]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::StepKind;

    #[test]
    fn test_remote_plan_order() {
        let steps = remote_to_audio("https://instagram.com/p/abc", RemoteSource::Instagram);
        let kinds: Vec<_> = steps.iter().map(StepSpec::kind).collect();
        assert_eq!(kinds, vec![StepKind::FetchRemote, StepKind::ExtractAudio]);
    }

    #[test]
    fn test_compose_plan_keeps_image_order() {
        let steps = compose_short(
            vec!["b".into(), "a".into(), "c".into()],
            "music".into(),
            ComposeOptions::default(),
        );
        match &steps[0] {
            StepSpec::Compose(request) => {
                let ids: Vec<_> = request.image_ids.iter().map(|i| i.as_str()).collect();
                assert_eq!(ids, vec!["b", "a", "c"]);
            }
            other => panic!("unexpected step {:?}", other),
        }
    }
}
