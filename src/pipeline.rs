use crate::{
    error::VestureResult,
    extract::extract,
    fit::solve,
    locate::locate,
    raster::RasterImage,
    render::render,
    services::{CancelToken, InferenceServices},
};

/// Run the full try-on chain: isolate the garment, locate the body, solve
/// the fit and composite. Stages run sequentially; the token is checked at
/// each stage boundary and a cancelled run produces no output.
#[tracing::instrument(skip_all)]
pub fn try_on(
    product: &RasterImage,
    user: &RasterImage,
    services: &InferenceServices,
    cancel: &CancelToken,
) -> VestureResult<RasterImage> {
    cancel.bail_if_cancelled()?;
    let sprite = extract(product, services.segmenter.as_deref());

    cancel.bail_if_cancelled()?;
    let region = locate(user, services);
    region.validate()?;

    cancel.bail_if_cancelled()?;
    let fit = solve(&sprite, &region);

    cancel.bail_if_cancelled()?;
    render(user, &sprite, &fit, &region)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VestureError;

    #[test]
    fn cancelled_token_short_circuits() {
        let product = RasterImage::filled(10, 10, [200, 30, 30, 255]).unwrap();
        let user = RasterImage::filled(10, 10, [120, 120, 120, 255]).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let out = try_on(&product, &user, &InferenceServices::none(), &cancel);
        assert!(matches!(out, Err(VestureError::Cancelled)));
    }

    #[test]
    fn output_matches_user_dimensions() {
        let product = RasterImage::filled(40, 40, [200, 30, 30, 255]).unwrap();
        let user = RasterImage::filled(80, 120, [150, 150, 150, 255]).unwrap();
        let out = try_on(
            &product,
            &user,
            &InferenceServices::none(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(out.width(), 80);
        assert_eq!(out.height(), 120);
    }
}
