use super::{Algorithm, PoolingDesc, WorkspaceDesc};
use crate::dtypes::Dtype;

/// Input rows (or columns) covered by window `o` along one axis, with the
/// padding cut off.
#[inline(always)]
fn window(o: usize, stride: usize, kernel: usize, pad: usize, input: usize) -> impl Iterator<Item = usize> {
    (0..kernel).filter_map(move |k| (o * stride + k).checked_sub(pad).filter(|&i| i < input))
}

pub(crate) fn forward<E: Dtype>(
    desc: &PoolingDesc,
    src: &[E],
    dst: &mut [E],
    mut workspace: Option<(&WorkspaceDesc, &mut [u32])>,
) {
    let (src_desc, dst_desc) = (&desc.src, &desc.dst);
    let (gh, gw) = (&desc.geometry.h, &desc.geometry.w);
    let area: E = num_traits::cast(gh.kernel * gw.kernel).unwrap_or_else(E::one);
    let inv_area = E::one() / area;
    let out = dst_desc.shape;
    for n in 0..out.batch {
        for c in 0..out.channels {
            for oh in 0..out.height {
                for ow in 0..out.width {
                    let rows = || window(oh, gh.stride, gh.kernel, gh.pad_near, gh.input);
                    let cols = || window(ow, gw.stride, gw.kernel, gw.pad_near, gw.input);
                    let value = match desc.algorithm {
                        Algorithm::PoolingAvg => {
                            let mut tmp = E::zero();
                            for y in rows() {
                                for x in cols() {
                                    tmp += src[src_desc.offset(n, c, y, x)];
                                }
                            }
                            tmp * inv_area
                        }
                        Algorithm::PoolingMax => {
                            // first cell is taken unconditionally, so the index
                            // stays in the window even for -inf or NaN
                            let mut best: Option<(E, usize)> = None;
                            for y in rows() {
                                for x in cols() {
                                    let v = src[src_desc.offset(n, c, y, x)];
                                    if best.map_or(true, |(tmp, _)| v > tmp) {
                                        best = Some((v, y * gw.input + x));
                                    }
                                }
                            }
                            let (tmp, argmax) = best.unwrap_or((E::neg_infinity(), 0));
                            if let Some((ws, buf)) = workspace.as_mut() {
                                buf[ws.offset(n, c, oh, ow)] = argmax as u32;
                            }
                            tmp
                        }
                    };
                    dst[dst_desc.offset(n, c, oh, ow)] = value;
                }
            }
        }
    }
}

/// Overwrites `diff_src` with the input gradient. Max pooling routes each
/// output gradient to the input position recorded in `workspace`, average
/// pooling spreads it evenly over the window.
pub(crate) fn backward<E: Dtype>(
    desc: &PoolingDesc,
    diff_dst: &[E],
    workspace: Option<(&WorkspaceDesc, &[u32])>,
    diff_src: &mut [E],
) {
    diff_src.fill(E::zero());
    let (src_desc, dst_desc) = (&desc.src, &desc.dst);
    let (gh, gw) = (&desc.geometry.h, &desc.geometry.w);
    let area: E = num_traits::cast(gh.kernel * gw.kernel).unwrap_or_else(E::one);
    let inv_area = E::one() / area;
    let out = dst_desc.shape;
    for n in 0..out.batch {
        for c in 0..out.channels {
            for oh in 0..out.height {
                for ow in 0..out.width {
                    let g = diff_dst[dst_desc.offset(n, c, oh, ow)];
                    match (desc.algorithm, workspace) {
                        (Algorithm::PoolingAvg, _) => {
                            let g = g * inv_area;
                            for y in window(oh, gh.stride, gh.kernel, gh.pad_near, gh.input) {
                                for x in window(ow, gw.stride, gw.kernel, gw.pad_near, gw.input) {
                                    diff_src[src_desc.offset(n, c, y, x)] += g;
                                }
                            }
                        }
                        (Algorithm::PoolingMax, Some((ws, buf))) => {
                            let idx = buf[ws.offset(n, c, oh, ow)] as usize;
                            let (y, x) = (idx / gw.input, idx % gw.input);
                            if y < gh.input {
                                diff_src[src_desc.offset(n, c, y, x)] += g;
                            }
                        }
                        // rejected by buffer checks before a kernel runs
                        (Algorithm::PoolingMax, None) => {}
                    }
                }
            }
        }
    }
}
