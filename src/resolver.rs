use crate::api::Asset;
use crate::config::FilePattern;
use crate::substitute::Groups;

/// An asset picked for a download, with the groups its name captured.
#[derive(Debug, Clone)]
pub struct ResolvedAsset {
    pub asset: Asset,
    pub groups: Groups,
}

/// Return the first asset, in listing order, whose whole name matches
/// `pattern`.
///
/// Later assets are never considered, even if they would also match.
pub fn resolve_asset<'a, I>(assets: I, pattern: &FilePattern) -> Option<ResolvedAsset>
where
    I: IntoIterator<Item = &'a Asset>,
{
    assets.into_iter().find_map(|asset| {
        pattern.full_match(&asset.name).map(|caps| ResolvedAsset {
            groups: Groups::from_captures(&caps),
            asset: asset.clone(),
        })
    })
}
